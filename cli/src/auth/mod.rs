//! Credential model for cxk.
//!
//! Identities name the protocol server a credential belongs to; each one maps
//! to an optional OAuth token record and an optional client registration.

pub mod identity;
pub mod tokens;

pub use identity::Identity;
pub use tokens::{ClientInfo, CredentialEntry, TokenRecord};
