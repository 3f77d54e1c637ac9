//! Secure credential storage using the operating system keyring.
//!
//! This module provides platform-specific secure storage for OAuth credentials:
//! - macOS: Keychain
//! - Linux: kernel keyutils
//! - Windows: Credential Manager
//!
//! Other platforms get [`UnsupportedStore`], which fails every call so the
//! orchestrator settles on the file fallback at startup.
//!
//! The whole credential document is stored as one JSON blob under a fixed
//! (service, account) pair.

use tracing::debug;

use crate::storage::document::CredentialDocument;
use crate::storage::error::{BackendFailure, FailureKind};

/// Result type for secure-store calls.
pub type SecureResult<T> = std::result::Result<T, BackendFailure>;

/// One opaque string value in a platform vault (enables mocking in tests).
///
/// Implementations never retry; fallback is the orchestrator's decision.
#[cfg_attr(test, mockall::automock)]
pub trait SecureStore {
    /// Reads the stored value, `None` if nothing has been stored.
    fn read(&self) -> SecureResult<Option<String>>;

    /// Stores a value, replacing any previous one.
    fn write(&self, value: &str) -> SecureResult<()>;

    /// Removes the stored value. No-op if nothing is stored.
    fn clear(&self) -> SecureResult<()>;
}

/// Secure store backed by the OS keyring.
pub struct KeyringStore {
    entry: keyring::Entry,
}

impl KeyringStore {
    /// Opens the keyring entry for the given service and account.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendFailure`] if the keyring entry cannot be created,
    /// which may occur if the keyring service is unavailable.
    pub fn new(service: &str, account: &str) -> SecureResult<Self> {
        let entry = keyring::Entry::new(service, account).map_err(map_keyring_error)?;
        Ok(Self { entry })
    }
}

impl SecureStore for KeyringStore {
    fn read(&self) -> SecureResult<Option<String>> {
        match self.entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(map_keyring_error(e)),
        }
    }

    fn write(&self, value: &str) -> SecureResult<()> {
        self.entry.set_password(value).map_err(map_keyring_error)
    }

    fn clear(&self) -> SecureResult<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(map_keyring_error(e)),
        }
    }
}

/// Placeholder for platforms without a usable vault.
pub struct UnsupportedStore {
    reason: String,
}

impl UnsupportedStore {
    /// Creates a store that fails every call with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn failure(&self) -> BackendFailure {
        BackendFailure::new(FailureKind::Unsupported, self.reason.clone())
    }
}

impl SecureStore for UnsupportedStore {
    fn read(&self) -> SecureResult<Option<String>> {
        Err(self.failure())
    }

    fn write(&self, _value: &str) -> SecureResult<()> {
        Err(self.failure())
    }

    fn clear(&self) -> SecureResult<()> {
        Err(self.failure())
    }
}

/// Selects the secure store for the current platform.
#[cfg(any(target_os = "macos", target_os = "windows", target_os = "linux"))]
pub fn platform_store(service: &str, account: &str) -> Box<dyn SecureStore> {
    match KeyringStore::new(service, account) {
        Ok(store) => Box::new(store),
        Err(failure) => {
            debug!("Keyring entry unavailable: {failure}");
            Box::new(UnsupportedStore::new(failure.message))
        }
    }
}

/// Selects the secure store for the current platform.
#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
pub fn platform_store(_service: &str, _account: &str) -> Box<dyn SecureStore> {
    debug!("No keyring provider for this platform");
    Box::new(UnsupportedStore::new("no keyring provider for this platform"))
}

/// Whether entries written by [`platform_store`] outlive a reboot.
///
/// On Linux the store is the kernel keyutils session keyring, which is
/// cleared when the machine restarts.
pub const fn survives_reboot() -> bool {
    !cfg!(target_os = "linux")
}

/// Maps keyring errors onto the backend failure taxonomy.
fn map_keyring_error(err: keyring::Error) -> BackendFailure {
    let kind = match &err {
        keyring::Error::NoStorageAccess(_) => FailureKind::Locked,
        keyring::Error::PlatformFailure(_) => FailureKind::Unsupported,
        keyring::Error::BadEncoding(_) => FailureKind::Corrupt,
        _ => FailureKind::AccessDenied,
    };
    BackendFailure::new(kind, err.to_string())
}

/// Credential document persisted through a [`SecureStore`].
pub struct SecureBackend {
    store: Box<dyn SecureStore>,
}

impl SecureBackend {
    /// Wraps a secure store.
    pub fn new(store: Box<dyn SecureStore>) -> Self {
        Self { store }
    }

    /// Lightweight read used to decide whether the store is usable.
    ///
    /// # Errors
    ///
    /// Returns the failure that made the store unusable, including an
    /// undecodable blob.
    pub fn probe(&self) -> SecureResult<()> {
        self.load().map(|_| ())
    }

    /// Loads the document, empty if nothing is stored yet.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendFailure`] if the store fails or the blob does not decode.
    pub fn load(&self) -> SecureResult<CredentialDocument> {
        let Some(blob) = self.store.read()? else {
            return Ok(CredentialDocument::default());
        };

        let document: CredentialDocument = serde_json::from_str(&blob).map_err(|e| {
            BackendFailure::new(FailureKind::Corrupt, format!("undecodable blob: {e}"))
        })?;

        if !document.is_supported() {
            return Err(BackendFailure::new(
                FailureKind::Corrupt,
                format!("unsupported document version {}", document.version),
            ));
        }

        Ok(document)
    }

    /// Persists the document. An empty document removes the entry.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendFailure`] if the store rejects the write.
    pub fn save(&self, document: &CredentialDocument) -> SecureResult<()> {
        if document.credentials.is_empty() {
            return self.store.clear();
        }

        let blob = serde_json::to_string(document).map_err(|e| {
            BackendFailure::new(FailureKind::Corrupt, format!("cannot encode document: {e}"))
        })?;
        self.store.write(&blob)
    }
}
