/// Transition log: one plain-text line per game start/end.
///
/// Each line has the form
///   `[YYYY-MM-DDTHH:MM:SS.ffffff] START|END <game id or None>`
/// with a local, timezone-naive timestamp.
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::detector::EventKind;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
/// Written in place of the game id when none has been resolved yet.
pub const ABSENT_GAME_ID: &str = "None";

/// Formats a single log line, including the trailing newline.
pub fn format_line(kind: EventKind, game_id: Option<&str>, timestamp: NaiveDateTime) -> String {
    format!(
        "[{}] {} {}\n",
        timestamp.format(TIMESTAMP_FORMAT),
        kind,
        game_id.unwrap_or(ABSENT_GAME_ID)
    )
}

/// Appends one line to `path`, creating the file if needed.
///
/// The file handle is scoped to this call and the data is synced before
/// returning, so nothing is buffered between transitions.
pub fn append(
    path: &Path,
    kind: EventKind,
    game_id: Option<&str>,
    timestamp: NaiveDateTime,
) -> Result<()> {
    let line = format_line(kind, game_id, timestamp);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open transition log: {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("Failed to write transition log: {}", path.display()))?;
    file.sync_data()
        .with_context(|| format!("Failed to sync transition log: {}", path.display()))?;
    Ok(())
}
