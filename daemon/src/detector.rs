/// Scene-transition detection.
///
/// A session is either outside the configured game scenes or inside them.
/// Entering any game scene from outside is a `START`; leaving the set while
/// inside is an `END`. Everything else is a no-op.
use std::fmt;

/// Kind of transition written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    End,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Start => "START",
            EventKind::End => "END",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory state of one streaming session. Lost on restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Whether the active scene is one of the game scenes.
    pub in_game_scene: bool,
    /// Last successfully resolved game id. Not cleared on `END`.
    pub current_game: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the state machine across `kind`.
    pub fn apply(&mut self, kind: EventKind) {
        self.in_game_scene = matches!(kind, EventKind::Start);
    }
}

/// Decides whether switching to `scene_name` is a transition.
pub fn detect(in_game_scene: bool, scene_name: &str, game_scenes: &[String]) -> Option<EventKind> {
    let is_game_scene = game_scenes.iter().any(|s| s == scene_name);
    match (in_game_scene, is_game_scene) {
        (false, true) => Some(EventKind::Start),
        (true, false) => Some(EventKind::End),
        _ => None,
    }
}
