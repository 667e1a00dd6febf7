use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::event::DaemonEvent;

pub const DEFAULT_OBS_HOST: &str = "localhost";
pub const DEFAULT_OBS_PORT: u16 = 4455;
pub const DEFAULT_RECONNECT_INTERVAL_SECS: u64 = 5;
pub const MIN_RECONNECT_INTERVAL_SECS: u64 = 1;

/// Read access to the settings the scene tagger needs on every event.
///
/// Values are queried fresh for each scene change so edits apply without a
/// restart. Empty values disable the matching feature.
pub trait ConfigurationProvider {
    /// Names of scenes that count as "in game".
    fn game_scenes(&self) -> &[String];
    /// Path of the transition log file.
    fn log_file_path(&self) -> &str;
    /// URL queried for the current game id.
    fn api_endpoint(&self) -> &str;
}

/// Root configuration structure. Deserialized from `config.toml`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tagger: TaggerConfig,
    #[serde(default)]
    pub obs: ObsConfig,
}

/// Which scenes to watch and where transitions go.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TaggerConfig {
    /// Switching into any of these scenes marks a game as started.
    #[serde(default)]
    pub game_scenes: Vec<String>,
    /// File that START/END lines are appended to.
    #[serde(default)]
    pub log_file: String,
    /// Endpoint returning JSON with a `current_game_id` field.
    #[serde(default)]
    pub api_url: String,
}

/// Connection settings for the OBS websocket server.
#[derive(Debug, Clone, Deserialize)]
pub struct ObsConfig {
    #[serde(default = "default_obs_host")]
    pub host: String,
    #[serde(default = "default_obs_port")]
    pub port: u16,
    /// Empty when authentication is disabled in OBS.
    #[serde(default)]
    pub password: String,
    /// Delay between reconnect attempts. Clamped to at least one second.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OBS_HOST.to_string(),
            port: DEFAULT_OBS_PORT,
            password: String::new(),
            reconnect_interval_secs: DEFAULT_RECONNECT_INTERVAL_SECS,
        }
    }
}

impl ObsConfig {
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    pub fn effective_reconnect_interval(&self) -> u64 {
        self.reconnect_interval_secs.max(MIN_RECONNECT_INTERVAL_SECS)
    }
}

impl ConfigurationProvider for Config {
    fn game_scenes(&self) -> &[String] {
        &self.tagger.game_scenes
    }

    fn log_file_path(&self) -> &str {
        self.tagger.log_file.trim()
    }

    fn api_endpoint(&self) -> &str {
        self.tagger.api_url.trim()
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Spawns a file watcher on the parent directory of `path`.  Whenever the config
/// file is created or modified, reloads it and sends a `ConfigReloaded` event.
///
/// `path` must be absolute; the watcher reports absolute paths.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<DaemonEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to create config file watcher: {e}");
            return;
        }
    };

    // Watch the directory so editor-style atomic saves (write + rename) are seen.
    let watch_dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        error!("Failed to watch config directory {}: {e}", watch_dir.display());
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        let affects_config = event.paths.iter().any(|p| p == path.as_path());
        let is_write = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        );

        if affects_config && is_write {
            match load_or_default(&path) {
                Ok(config) => {
                    if tx.send(DaemonEvent::ConfigReloaded(config)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to reload config: {e:#}"),
            }
        }
    }
}

fn default_obs_host() -> String {
    DEFAULT_OBS_HOST.to_string()
}

fn default_obs_port() -> u16 {
    DEFAULT_OBS_PORT
}

fn default_reconnect_interval() -> u64 {
    DEFAULT_RECONNECT_INTERVAL_SECS
}
