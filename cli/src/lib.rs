//! contextkit credential storage.
//!
//! Persists OAuth credentials for configured protocol servers so they survive
//! across invocations: the OS keyring when it answers, otherwise a locked,
//! owner-only YAML file. See [`storage::TokenStorage`] for the contract.

pub mod auth;
pub mod config;
pub mod error;
pub mod storage;

pub use auth::{ClientInfo, Identity, TokenRecord};
pub use config::{CxkConfig, StorageConfig};
pub use error::{CxkError, Result};
pub use storage::TokenStorage;
