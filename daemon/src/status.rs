use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::detector::EventKind;
use crate::tagger::TransitionRecord;

/// Whether the live scene is one of the game scenes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "snake_case")]
pub enum TaggerState {
    /// Outside the game scenes (initial state).
    Idle,
    /// A game scene is live; the next non-game scene logs `END`.
    InGame,
}

/// Runtime status written by the daemon to `status.toml`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TaggerStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    pub state: TaggerState,
    /// Whether a websocket session to OBS is currently identified.
    pub obs_connected: bool,
    /// Game id used on the most recent transition line, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_game: Option<String>,
    /// Local timestamp of the most recent transition, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition: Option<String>,
    /// Human-readable message for the most recent failed log write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaggerStatus {
    /// Constructs the initial idle status on daemon startup.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: TaggerState::Idle,
            obs_connected: false,
            current_game: None,
            last_transition: None,
            error: None,
        }
    }

    /// Folds a transition into the status.
    pub fn record(&mut self, transition: &TransitionRecord) {
        self.state = match transition.kind {
            EventKind::Start => TaggerState::InGame,
            EventKind::End => TaggerState::Idle,
        };
        self.current_game = transition.game_id.clone();
        self.last_transition =
            Some(transition.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string());
        self.error = transition.write_error.clone();
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Logs errors rather than panicking; a status write failure must never stop the daemon.
pub fn write_status(path: &Path, status: &TaggerStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create status directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                warn!("Failed to write status file {}: {e}", path.display());
            }
        }
        Err(e) => warn!("Failed to serialize status: {e}"),
    }
}
