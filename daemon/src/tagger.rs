/// Scene tagger: turns scene-change notifications into transition log lines.
///
/// Owns the session state for the lifetime of the daemon. For each scene
/// change it asks the detector whether a transition happened, resolves the
/// game id on `START`, appends the line, and then moves the state machine.
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::config::ConfigurationProvider;
use crate::detector::{self, EventKind, SessionState};
use crate::resolver::GameIdResolver;
use crate::transition_log;

/// Outcome of a scene change that crossed the game-scene boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    pub kind: EventKind,
    /// Game id written on the line, possibly stale.
    pub game_id: Option<String>,
    pub timestamp: NaiveDateTime,
    /// Set when the line could not be appended.
    pub write_error: Option<String>,
}

pub struct SceneTagger<R> {
    session: SessionState,
    resolver: R,
}

impl<R: GameIdResolver> SceneTagger<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            session: SessionState::new(),
            resolver,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Handles a switch to `scene_name` observed at `timestamp`.
    ///
    /// Returns `None` when the switch is not a transition. A failed game id
    /// lookup or log write never prevents the state from changing.
    pub async fn on_scene_changed<C>(
        &mut self,
        scene_name: &str,
        config: &C,
        timestamp: NaiveDateTime,
    ) -> Option<TransitionRecord>
    where
        C: ConfigurationProvider + ?Sized,
    {
        let Some(kind) =
            detector::detect(self.session.in_game_scene, scene_name, config.game_scenes())
        else {
            debug!(scene = scene_name, "Scene change is not a transition");
            return None;
        };

        match kind {
            EventKind::Start => {
                info!(scene = scene_name, "Entering game");
                self.refresh_game(config.api_endpoint()).await;
            }
            EventKind::End => info!(scene = scene_name, "Leaving game"),
        }

        let game_id = self.session.current_game.clone();
        let write_error =
            write_transition(config.log_file_path(), kind, game_id.as_deref(), timestamp)
                .err()
                .map(|e| format!("{e:#}"));
        self.session.apply(kind);

        Some(TransitionRecord {
            kind,
            game_id,
            timestamp,
            write_error,
        })
    }

    /// Updates `current_game` from the endpoint. A failed lookup leaves the
    /// previous id in place.
    async fn refresh_game(&mut self, endpoint: &str) {
        if endpoint.is_empty() {
            debug!("No API endpoint configured; keeping previous game id");
            return;
        }
        match self.resolver.resolve(endpoint).await {
            Ok(Some(id)) => {
                info!(game_id = %id, "Resolved current game");
                self.session.current_game = Some(id);
            }
            Ok(None) => {
                info!("Endpoint reports no current game");
                self.session.current_game = None;
            }
            Err(e) => warn!("Failed to get current game from {endpoint}: {e}"),
        }
    }
}

fn write_transition(
    path: &str,
    kind: EventKind,
    game_id: Option<&str>,
    timestamp: NaiveDateTime,
) -> anyhow::Result<()> {
    if path.is_empty() {
        debug!("No log file configured; {kind} not written");
        return Ok(());
    }
    transition_log::append(Path::new(path), kind, game_id, timestamp).map_err(|e| {
        error!("Failed to log {kind}: {e:#}");
        e
    })
}
