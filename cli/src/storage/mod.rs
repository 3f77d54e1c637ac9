//! Credential storage for cxk.
//!
//! This module provides two backends behind one contract:
//! - [`SecureBackend`] - the OS keyring, preferred when it answers
//! - [`FileStore`] - a locked, atomically replaced YAML file fallback
//!
//! [`TokenStorage`] picks between them and is the only type callers need.

pub mod document;
pub mod error;
pub mod file;
pub mod keychain;
pub mod orchestrator;

pub use document::{CredentialDocument, DOCUMENT_VERSION};
pub use error::{BackendFailure, FailureKind, FileStoreError};
pub use file::FileStore;
pub use keychain::{
    platform_store, survives_reboot, KeyringStore, SecureBackend, SecureStore, UnsupportedStore,
};
pub use orchestrator::{BackendState, TokenStorage};
