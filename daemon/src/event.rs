use crate::config::Config;

pub enum DaemonEvent {
    /// OBS switched its program scene.
    SceneChanged(String),
    /// The websocket session to OBS was identified.
    ObsConnected,
    /// The websocket session to OBS ended; a reconnect is pending.
    ObsDisconnected,
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// Ctrl+C received; the daemon should write its final status and exit.
    Shutdown,
}
