//! Backend-local error types.
//!
//! These never reach storage callers directly: the orchestrator turns them
//! into a state transition or into one of the caller-facing variants of
//! [`CxkError`](crate::error::CxkError).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why the OS secure store could not serve a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The store exists but needs an unlock or prompt that cannot happen here.
    Locked,
    /// No secure-store provider on this platform or session.
    Unsupported,
    /// The platform refused the read or write.
    AccessDenied,
    /// The stored blob does not decode.
    Corrupt,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "locked"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::AccessDenied => write!(f, "access denied"),
            Self::Corrupt => write!(f, "corrupt"),
        }
    }
}

/// A secure-store call failed; the orchestrator falls back to the file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("secure store {kind}: {message}")]
pub struct BackendFailure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Platform diagnostics, safe to log.
    pub message: String,
}

impl BackendFailure {
    /// Creates a failure of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors from the file-fallback backend.
#[derive(Error, Debug)]
pub enum FileStoreError {
    /// Disk or permission problem.
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document exists but does not parse.
    #[error("{} is not a valid credential document: {details}", path.display())]
    Corrupt {
        /// Document location.
        path: PathBuf,
        /// Parser diagnostics.
        details: String,
    },

    /// Another process held the write lock past the timeout.
    #[error("timed out after {}ms waiting for lock on {}", timeout.as_millis(), path.display())]
    LockTimeout {
        /// Lock file location.
        path: PathBuf,
        /// How long we waited.
        timeout: Duration,
    },
}

impl FileStoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
