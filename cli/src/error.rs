//! Error types and result aliases for cxk.
//!
//! Storage callers only ever see three storage outcomes besides success:
//! - [`CxkError::InvalidIdentity`] for malformed keys (caller error)
//! - [`CxkError::BackendUnavailable`] once every backend has been exhausted
//! - [`CxkError::Corrupt`] when the fallback document cannot be parsed
//!
//! Backend-local failures live in [`crate::storage::error`] and are converted
//! by the orchestrator; they never leak out as distinct variants here.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for cxk operations.
///
/// Each variant includes a user-friendly message with actionable recovery steps.
#[derive(Error, Debug)]
pub enum CxkError {
    /// The identity cannot be used as a credential key.
    #[error("Invalid identity '{identity}': {reason}")]
    InvalidIdentity {
        /// The rejected identity.
        identity: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Neither the OS keyring nor the fallback file could serve the request.
    #[error("Credential storage is unavailable: {0}. Check permissions on the secrets file or unlock your system keyring.")]
    BackendUnavailable(String),

    /// The fallback document exists but cannot be read. It is never erased automatically.
    #[error("Stored credentials at {} are corrupted: {details}. Fix or remove the file manually; it was left untouched.", path.display())]
    Corrupt {
        /// Location of the unreadable document.
        path: PathBuf,
        /// Parser diagnostics.
        details: String,
    },

    /// General configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}. Check file permissions and format.")]
    ConfigRead(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A command-line value cannot be used.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CxkError {
    /// Checks if this error was caused by the caller's input.
    ///
    /// These are never worth retrying.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidIdentity { .. } | Self::InvalidArgument(_))
    }

    /// Checks if this error is transient and the operation might succeed on retry.
    ///
    /// `BackendUnavailable` covers lock contention and a keyring that may be
    /// unlocked later; corruption needs a human.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }

    pub(crate) fn invalid_identity(identity: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            identity: identity.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using [`CxkError`].
pub type Result<T> = std::result::Result<T, CxkError>;

impl From<toml::de::Error> for CxkError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigRead(format!("TOML parse error: {err}"))
    }
}
