//! Where dimple keeps its user-level config file.
//!
//! Catalog CSVs and per-environment overrides live wherever the user runs the tool.

use std::path::PathBuf;

/// The per-user config directory, e.g. `~/.config/dimple/` on Linux.
/// Returns `None` if no home directory can be determined. Does not create it.
pub fn config_dir() -> Option<PathBuf> {
    Some(directories::ProjectDirs::from("dev", "Dimple", "dimple")?.config_dir().to_path_buf())
}

/// Like [config_dir], but creates the directory if it doesn't exist.
pub fn ensure_config_dir() -> Option<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}
