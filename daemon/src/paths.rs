/// Default file locations for scenetag.
///
/// Both files live in a per-user `scenetag` directory:
///   - config.toml  Edited by the user, read (and watched) by the daemon.
///   - status.toml  Written by the daemon.
///
/// The directory comes from the platform's per-user config location
/// (`$XDG_CONFIG_HOME/scenetag` on Linux, `%APPDATA%\scenetag\config` on
/// Windows). When no home directory can be found the working directory is used.
use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "scenetag";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";

/// Returns the scenetag application data directory.
pub fn app_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
        proj_dirs.config_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}

/// Returns the default config file path.
pub fn config_file_path() -> PathBuf {
    app_data_dir().join(CONFIG_FILE_NAME)
}

/// Returns the default status file path.
pub fn status_file_path() -> PathBuf {
    app_data_dir().join(STATUS_FILE_NAME)
}

/// Resolves `path` against the working directory when it is relative.
pub fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}
