//! Platform-specific path utilities for cxk.

use std::path::PathBuf;

use crate::error::{CxkError, Result};

/// Directory name under the platform config directory.
pub const APP_DIR: &str = "contextkit";

/// Get the configuration directory for cxk.
///
/// - Linux / macOS: `$XDG_CONFIG_HOME/contextkit`, else `~/.config/contextkit`
/// - Windows: `%APPDATA%\contextkit`
pub fn config_dir() -> Result<PathBuf> {
    Ok(base_config_dir()?.join(APP_DIR))
}

#[cfg(unix)]
fn base_config_dir() -> Result<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        let xdg = PathBuf::from(xdg);
        if xdg.is_absolute() {
            return Ok(xdg);
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".config"))
        .ok_or_else(|| CxkError::Config("Cannot determine home directory".to_string()))
}

#[cfg(not(unix))]
fn base_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .ok_or_else(|| CxkError::Config("Cannot determine config directory".to_string()))
}

/// Get the main configuration file path.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the default fallback credential document path.
pub fn secrets_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("secrets.yaml"))
}
