//! Configuration management for cxk.

pub mod paths;
pub mod settings;

pub use paths::config_file;
pub use settings::{CxkConfig, StorageConfig};

use std::path::Path;

use crate::error::Result;

/// Load configuration from the default config file.
///
/// If the config file doesn't exist, returns default configuration.
pub fn load_config() -> Result<CxkConfig> {
    let path = config_file()?;
    load_config_from(&path)
}

/// Load configuration from a specific path.
///
/// If the file doesn't exist, returns default configuration.
pub fn load_config_from(path: &Path) -> Result<CxkConfig> {
    if !path.exists() {
        return Ok(CxkConfig::default().with_env_overrides());
    }

    let contents = std::fs::read_to_string(path)?;
    let config: CxkConfig = toml::from_str(&contents)?;

    Ok(config.with_env_overrides())
}
