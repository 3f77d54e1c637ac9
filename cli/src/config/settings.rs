//! Application configuration settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::paths::secrets_file;
use crate::error::Result;

/// Keyring service all installations share.
pub const DEFAULT_SERVICE_NAME: &str = "contextkit";
/// Keyring account holding the credential document.
pub const DEFAULT_ACCOUNT_NAME: &str = "secrets";
/// How long a writer waits for the fallback file lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 3_000;

/// Main configuration for cxk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CxkConfig {
    /// Credential storage settings.
    pub storage: StorageConfig,
}

/// Credential storage configuration.
///
/// Read-only to the storage subsystem; consumed once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Whether to try the OS keyring before the fallback file.
    pub keychain_enabled: bool,
    /// Fallback document location (defaults to `<config-dir>/contextkit/secrets.yaml`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_path: Option<PathBuf>,
    /// Keyring service name.
    pub service_name: String,
    /// Keyring account name.
    pub account_name: String,
    /// Fallback file lock timeout in milliseconds.
    pub lock_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            keychain_enabled: true,
            fallback_path: None,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            account_name: DEFAULT_ACCOUNT_NAME.to_string(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl StorageConfig {
    /// The configured fallback path, or the platform default.
    pub fn resolved_fallback_path(&self) -> Result<PathBuf> {
        match &self.fallback_path {
            Some(path) => Ok(path.clone()),
            None => secrets_file(),
        }
    }

    /// Lock timeout as a [`Duration`].
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Environment variables that can override configuration.
pub mod env {
    pub const KEYCHAIN: &str = "CXK_KEYCHAIN";
    pub const SECRETS_FILE: &str = "CXK_SECRETS_FILE";
    pub const LOG_LEVEL: &str = "CXK_LOG";
}

impl CxkConfig {
    /// Apply environment variable overrides to the configuration.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(env::KEYCHAIN) {
            if let Some(enabled) = parse_flag(&value) {
                self.storage.keychain_enabled = enabled;
            }
        }

        if let Some(path) = lookup(env::SECRETS_FILE) {
            if !path.trim().is_empty() {
                self.storage.fallback_path = Some(PathBuf::from(path));
            }
        }

        self
    }
}

/// Parses the usual spellings of a boolean switch.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
