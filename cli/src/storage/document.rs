//! The logical credential store shared by both backends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::auth::{ClientInfo, CredentialEntry, Identity, TokenRecord};

/// Current schema version of the credential document.
pub const DOCUMENT_VERSION: u32 = 2;

const fn current_version() -> u32 {
    DOCUMENT_VERSION
}

/// Mapping from identity to stored credentials.
///
/// The keyring holds this as one JSON blob, the fallback file as YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDocument {
    /// Schema version for future migrations.
    #[serde(default = "current_version")]
    pub version: u32,
    /// Entries keyed by identity, ordered for stable output.
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialEntry>,
}

impl Default for CredentialDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            credentials: BTreeMap::new(),
        }
    }
}

impl CredentialDocument {
    /// Whether this build understands the document's schema.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.version <= DOCUMENT_VERSION
    }

    /// Tokens stored for an identity.
    #[must_use]
    pub fn tokens(&self, identity: &Identity) -> Option<&TokenRecord> {
        self.credentials
            .get(identity.as_str())
            .and_then(|entry| entry.tokens.as_ref())
    }

    /// Client registration stored for an identity.
    #[must_use]
    pub fn client_info(&self, identity: &Identity) -> Option<&ClientInfo> {
        self.credentials
            .get(identity.as_str())
            .and_then(|entry| entry.client_info.as_ref())
    }

    /// Replaces the tokens for an identity, keeping its client registration.
    pub fn set_tokens(&mut self, identity: &Identity, record: TokenRecord) {
        self.entry_mut(identity).tokens = Some(record);
    }

    /// Replaces the client registration for an identity, keeping its tokens.
    pub fn set_client_info(&mut self, identity: &Identity, info: ClientInfo) {
        self.entry_mut(identity).client_info = Some(info);
    }

    /// Removes everything stored for an identity.
    ///
    /// Returns `true` if there was anything to remove.
    pub fn remove(&mut self, identity: &Identity) -> bool {
        self.credentials.remove(identity.as_str()).is_some()
    }

    /// Identities with a stored entry, sorted.
    #[must_use]
    pub fn identities(&self) -> Vec<String> {
        self.credentials
            .iter()
            .filter(|(_, entry)| !entry.is_empty())
            .map(|(identity, _)| identity.clone())
            .collect()
    }

    fn entry_mut(&mut self, identity: &Identity) -> &mut CredentialEntry {
        self.credentials
            .entry(identity.as_str().to_string())
            .or_default()
    }
}
