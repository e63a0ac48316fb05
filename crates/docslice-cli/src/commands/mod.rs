//! CLI command implementations.

pub mod config;
pub mod init;
pub mod parse;
pub mod sections;

use anyhow::{Context, Result};
use docslice_config::{AppPaths, Config};
use std::path::{Path, PathBuf};

/// Get the application paths.
pub fn get_paths() -> Result<AppPaths> {
    AppPaths::new().context("Failed to determine application directories")
}

/// The config file in use: the explicit one, else the platform default.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(get_paths()?.config_file),
    }
}

/// Load the configuration; a missing file yields the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = config_path(explicit)?;
    Config::load_from(&path).with_context(|| format!("Failed to load config {}", path.display()))
}

/// Single-line preview of a text, cut at `max` characters.
pub fn preview(text: &str, max: usize) -> String {
    let flat: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_flattens_and_cuts() {
        assert_eq!(preview("a\n  b\tc", 10), "a b c");
        assert_eq!(preview("abcdef", 3), "abc…");
    }

    #[test]
    fn test_explicit_config_path() {
        let path = config_path(Some(Path::new("/tmp/docslice.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/docslice.toml"));
    }
}
