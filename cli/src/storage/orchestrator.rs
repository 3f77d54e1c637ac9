//! Backend selection and the public storage contract.
//!
//! [`TokenStorage`] decides once per process which backend is active:
//!
//! ```text
//! keychain disabled ──────────────────────────────► DisabledByConfig
//! otherwise ─► Probing ─ probe ok ─► SecureActive ─ any failure ─► FileActive
//!                      └ probe fails ───────────────────────────► FileActive
//! ```
//!
//! Degradation is one-way. Once the keyring has failed, the process never
//! calls it again, so a token is never written to one backend and then read
//! from the other within a single run. A failing call is retried once against
//! the file before returning.

use chrono::Utc;
use tracing::{debug, warn};

use crate::auth::{ClientInfo, Identity, TokenRecord};
use crate::config::StorageConfig;
use crate::error::{CxkError, Result};
use crate::storage::document::CredentialDocument;
use crate::storage::error::{BackendFailure, FileStoreError};
use crate::storage::file::FileStore;
use crate::storage::keychain::{platform_store, SecureBackend, SecureStore};

/// Which backend serves calls for the rest of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    /// Keyring turned off by configuration; the file is used exclusively.
    DisabledByConfig,
    /// Construction is checking whether the keyring answers.
    Probing,
    /// The keyring serves calls.
    SecureActive,
    /// The keyring failed; the file is used exclusively.
    FileActive,
}

/// OAuth credential storage with keyring-first, file-fallback semantics.
pub struct TokenStorage {
    state: BackendState,
    secure: Option<SecureBackend>,
    file: FileStore,
}

impl TokenStorage {
    /// Builds storage from configuration, probing the platform keyring unless disabled.
    ///
    /// # Errors
    ///
    /// Returns [`CxkError::Config`] if the fallback path cannot be determined.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let file = FileStore::new(config.resolved_fallback_path()?, config.lock_timeout());

        if !config.keychain_enabled {
            return Ok(Self::file_only(file));
        }

        let store = platform_store(&config.service_name, &config.account_name);
        Ok(Self::with_secure_store(store, file))
    }

    /// Storage that never touches a keyring.
    pub fn file_only(file: FileStore) -> Self {
        debug!(
            "Keyring disabled by configuration; using {}",
            file.path().display()
        );
        Self {
            state: BackendState::DisabledByConfig,
            secure: None,
            file,
        }
    }

    /// Storage that prefers `store`, falling back to `file`.
    ///
    /// Probes `store` immediately.
    pub fn with_secure_store(store: Box<dyn SecureStore>, file: FileStore) -> Self {
        let mut storage = Self {
            state: BackendState::Probing,
            secure: Some(SecureBackend::new(store)),
            file,
        };
        storage.probe();
        storage
    }

    fn probe(&mut self) {
        let outcome = self.secure.as_ref().map(SecureBackend::probe);
        match outcome {
            Some(Ok(())) => {
                debug!("Keyring available; storing credentials there");
                self.state = BackendState::SecureActive;
            }
            Some(Err(failure)) => self.degrade("probe", &failure),
            None => self.state = BackendState::FileActive,
        }
    }

    /// Current backend state.
    #[cfg(test)]
    pub(crate) const fn state(&self) -> BackendState {
        self.state
    }

    /// Loads the tokens stored for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`CxkError::InvalidIdentity`], [`CxkError::Corrupt`], or
    /// [`CxkError::BackendUnavailable`] if no backend could answer.
    pub fn get(&mut self, identity: &str) -> Result<Option<TokenRecord>> {
        let identity = Identity::parse(identity)?;
        self.read_document("get", |doc| doc.tokens(&identity).cloned())
    }

    /// Stores tokens for `identity`, replacing any previous tokens.
    ///
    /// `issued_at` is stamped with the current time. The identity's client
    /// registration, if any, is kept.
    ///
    /// # Errors
    ///
    /// Returns [`CxkError::InvalidIdentity`], [`CxkError::Corrupt`], or
    /// [`CxkError::BackendUnavailable`] if no backend accepted the write.
    pub fn set(&mut self, identity: &str, record: TokenRecord) -> Result<()> {
        let identity = Identity::parse(identity)?;
        let record = TokenRecord {
            issued_at: Some(Utc::now()),
            ..record
        };

        self.write_document("set", |doc| {
            doc.set_tokens(&identity, record.clone());
            true
        })
    }

    /// Removes everything stored for `identity`. Absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CxkError::InvalidIdentity`], [`CxkError::Corrupt`], or
    /// [`CxkError::BackendUnavailable`] if no backend accepted the write.
    pub fn delete(&mut self, identity: &str) -> Result<()> {
        let identity = Identity::parse(identity)?;
        self.write_document("delete", |doc| doc.remove(&identity))
    }

    /// Identities stored in the active backend, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`CxkError::Corrupt`] or [`CxkError::BackendUnavailable`].
    pub fn list_identities(&mut self) -> Result<Vec<String>> {
        self.read_document("list", CredentialDocument::identities)
    }

    /// Loads the OAuth client registration stored for `identity`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_client_info(&mut self, identity: &str) -> Result<Option<ClientInfo>> {
        let identity = Identity::parse(identity)?;
        self.read_document("get client info", |doc| doc.client_info(&identity).cloned())
    }

    /// Stores the OAuth client registration for `identity`, keeping its tokens.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn set_client_info(&mut self, identity: &str, info: ClientInfo) -> Result<()> {
        let identity = Identity::parse(identity)?;
        self.write_document("set client info", |doc| {
            doc.set_client_info(&identity, info.clone());
            true
        })
    }

    fn read_document<T, F>(&mut self, operation: &'static str, extract: F) -> Result<T>
    where
        F: Fn(&CredentialDocument) -> T,
    {
        if let Some(secure) = self.active_secure() {
            match secure.load() {
                Ok(doc) => {
                    debug!("Served {operation} from keyring");
                    return Ok(extract(&doc));
                }
                Err(failure) => self.degrade(operation, &failure),
            }
        }

        let doc = self.file.load().map_err(surface)?;
        debug!("Served {operation} from {}", self.file.path().display());
        Ok(extract(&doc))
    }

    fn write_document<F>(&mut self, operation: &'static str, mutate: F) -> Result<()>
    where
        F: Fn(&mut CredentialDocument) -> bool,
    {
        if let Some(secure) = self.active_secure() {
            let outcome = secure.load().and_then(|mut doc| {
                if mutate(&mut doc) {
                    secure.save(&doc)
                } else {
                    Ok(())
                }
            });
            match outcome {
                Ok(()) => {
                    debug!("Committed {operation} to keyring");
                    return Ok(());
                }
                Err(failure) => self.degrade(operation, &failure),
            }
        }

        self.file.update(&mutate).map_err(surface)?;
        debug!("Committed {operation} to {}", self.file.path().display());
        Ok(())
    }

    fn active_secure(&self) -> Option<&SecureBackend> {
        match self.state {
            BackendState::SecureActive => self.secure.as_ref(),
            _ => None,
        }
    }

    /// Abandons the keyring for the rest of the process.
    fn degrade(&mut self, operation: &str, failure: &BackendFailure) {
        warn!(
            "Keyring unavailable during {operation} ({failure}); using {} for the rest of this run",
            self.file.path().display()
        );
        self.secure = None;
        self.state = BackendState::FileActive;
    }
}

/// Converts a file-backend failure into the caller-facing error.
///
/// The keyring is disabled, already abandoned, or just failed for this very
/// call, so anything but corruption means every backend is exhausted.
fn surface(err: FileStoreError) -> CxkError {
    match err {
        FileStoreError::Corrupt { path, details } => CxkError::Corrupt { path, details },
        other => CxkError::BackendUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::FailureKind;
    use crate::storage::keychain::{MockSecureStore, SecureResult};
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::rc::Rc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// In-memory vault whose failures can be switched on mid-test.
    #[derive(Default)]
    struct FakeVault {
        value: RefCell<Option<String>>,
        fail_reads: Cell<Option<FailureKind>>,
        fail_writes: Cell<Option<FailureKind>>,
        calls: Cell<usize>,
    }

    impl FakeVault {
        fn check(&self, failing: &Cell<Option<FailureKind>>) -> SecureResult<()> {
            self.calls.set(self.calls.get() + 1);
            match failing.get() {
                Some(kind) => Err(BackendFailure::new(kind, "injected")),
                None => Ok(()),
            }
        }
    }

    impl SecureStore for Rc<FakeVault> {
        fn read(&self) -> SecureResult<Option<String>> {
            self.check(&self.fail_reads)?;
            Ok(self.value.borrow().clone())
        }

        fn write(&self, value: &str) -> SecureResult<()> {
            self.check(&self.fail_writes)?;
            *self.value.borrow_mut() = Some(value.to_string());
            Ok(())
        }

        fn clear(&self) -> SecureResult<()> {
            self.check(&self.fail_writes)?;
            *self.value.borrow_mut() = None;
            Ok(())
        }
    }

    fn file_store(dir: &TempDir) -> FileStore {
        FileStore::new(
            dir.path().join("contextkit").join("secrets.yaml"),
            Duration::from_millis(500),
        )
    }

    fn record(access_token: &str) -> TokenRecord {
        TokenRecord {
            refresh_token: Some(format!("{access_token}-refresh")),
            scope: Some("read write".to_string()),
            ..TokenRecord::new(access_token)
        }
    }

    fn without_issued_at(record: TokenRecord) -> TokenRecord {
        TokenRecord {
            issued_at: None,
            ..record
        }
    }

    #[test]
    fn set_then_get_returns_record_with_fresh_issued_at() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = TokenStorage::file_only(file_store(&temp_dir));

        let before = Utc::now();
        storage.set("github", record("abc")).unwrap();

        let stored = storage.get("github").unwrap().unwrap();
        assert!(stored.issued_at.unwrap() >= before);
        assert_eq!(without_issued_at(stored), record("abc"));
    }

    #[test]
    fn issued_at_from_caller_is_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = TokenStorage::file_only(file_store(&temp_dir));

        let stale = Utc::now() - chrono::Duration::days(30);
        let mut input = record("abc");
        input.issued_at = Some(stale);
        storage.set("github", input).unwrap();

        assert!(storage.get("github").unwrap().unwrap().issued_at.unwrap() > stale);
    }

    #[test]
    fn delete_then_get_is_absent() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = TokenStorage::file_only(file_store(&temp_dir));

        storage.set("github", record("abc")).unwrap();
        storage.delete("github").unwrap();

        assert_eq!(storage.get("github").unwrap(), None);
        assert!(storage.list_identities().unwrap().is_empty());
    }

    #[test]
    fn delete_of_unknown_identity_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = TokenStorage::file_only(file_store(&temp_dir));

        storage.delete("never-stored").unwrap();
        storage.set("github", record("abc")).unwrap();
        storage.delete("never-stored").unwrap();

        assert_eq!(storage.list_identities().unwrap(), vec!["github"]);
    }

    #[test]
    fn keychain_disabled_scenario_writes_document() {
        let temp_dir = TempDir::new().unwrap();
        let file = file_store(&temp_dir);
        let path = file.path().to_path_buf();
        let mut storage = TokenStorage::file_only(file);
        assert_eq!(storage.state(), BackendState::DisabledByConfig);

        storage.set("jira", TokenRecord::new("abc")).unwrap();
        let stored = storage.get("jira").unwrap().unwrap();

        assert_eq!(stored.access_token, "abc");
        assert_eq!(stored.token_type, "Bearer");
        assert_eq!(stored.refresh_token, None);
        assert!(stored.issued_at.is_some());

        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.contains("jira:"));
        assert!(contents.contains("access_token: abc"));
    }

    #[test]
    fn invalid_identity_is_rejected_before_any_backend_call() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = MockSecureStore::new();
        store.expect_read().times(1).returning(|| Ok(None));
        let mut storage = TokenStorage::with_secure_store(Box::new(store), file_store(&temp_dir));

        for bad in ["", "../escape", "a/b"] {
            assert!(matches!(
                storage.set(bad, record("x")),
                Err(CxkError::InvalidIdentity { .. })
            ));
            assert!(matches!(
                storage.get(bad),
                Err(CxkError::InvalidIdentity { .. })
            ));
            assert!(matches!(
                storage.delete(bad),
                Err(CxkError::InvalidIdentity { .. })
            ));
        }
        assert_eq!(storage.state(), BackendState::SecureActive);
    }

    #[test]
    fn failed_probe_never_calls_keyring_again() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = MockSecureStore::new();
        store
            .expect_read()
            .times(1)
            .returning(|| Err(BackendFailure::new(FailureKind::Unsupported, "no dbus")));
        store.expect_write().never();
        store.expect_clear().never();

        let mut storage = TokenStorage::with_secure_store(Box::new(store), file_store(&temp_dir));
        assert_eq!(storage.state(), BackendState::FileActive);

        storage.set("a", record("1")).unwrap();
        storage.set("b", record("2")).unwrap();
        storage.delete("b").unwrap();

        assert_eq!(storage.list_identities().unwrap(), vec!["a"]);
        assert_eq!(storage.get("a").unwrap().unwrap().access_token, "1");
    }

    #[test]
    fn corrupt_keyring_blob_fails_probe() {
        let temp_dir = TempDir::new().unwrap();
        let vault = Rc::new(FakeVault::default());
        *vault.value.borrow_mut() = Some("{not json".to_string());

        let storage =
            TokenStorage::with_secure_store(Box::new(Rc::clone(&vault)), file_store(&temp_dir));
        assert_eq!(storage.state(), BackendState::FileActive);
    }

    #[test]
    fn locked_write_retries_on_file_and_stays_there() {
        let temp_dir = TempDir::new().unwrap();
        let file = file_store(&temp_dir);
        let path = file.path().to_path_buf();
        let vault = Rc::new(FakeVault::default());
        let mut storage = TokenStorage::with_secure_store(Box::new(Rc::clone(&vault)), file);
        assert_eq!(storage.state(), BackendState::SecureActive);

        storage.set("a", record("rec1")).unwrap();
        assert!(vault.value.borrow().as_deref().unwrap().contains("rec1"));
        assert!(!path.exists());

        vault.fail_writes.set(Some(FailureKind::Locked));
        storage.set("a", record("rec2")).unwrap();
        assert_eq!(storage.state(), BackendState::FileActive);

        let calls_after_degrade = vault.calls.get();
        let stored = storage.get("a").unwrap().unwrap();
        assert_eq!(stored.access_token, "rec2");
        assert_eq!(vault.calls.get(), calls_after_degrade);

        // The keyring copy is untouched, the fallback holds the new value.
        assert!(vault.value.borrow().as_deref().unwrap().contains("rec1"));
        assert!(fs::read_to_string(path).unwrap().contains("rec2"));
    }

    #[test]
    fn failed_read_falls_back_for_the_same_call() {
        let temp_dir = TempDir::new().unwrap();
        let file = file_store(&temp_dir);
        file.update(|doc| {
            doc.set_tokens(&Identity::parse("a").unwrap(), TokenRecord::new("from-file"));
            true
        })
        .unwrap();

        let vault = Rc::new(FakeVault::default());
        let mut storage = TokenStorage::with_secure_store(Box::new(Rc::clone(&vault)), file);

        vault.fail_reads.set(Some(FailureKind::AccessDenied));
        assert_eq!(
            storage.get("a").unwrap().unwrap().access_token,
            "from-file"
        );
        assert_eq!(storage.state(), BackendState::FileActive);

        vault.fail_reads.set(None);
        let calls = vault.calls.get();
        storage.list_identities().unwrap();
        assert_eq!(vault.calls.get(), calls);
    }

    #[test]
    fn list_queries_only_the_active_backend() {
        let temp_dir = TempDir::new().unwrap();
        let file = file_store(&temp_dir);
        file.update(|doc| {
            doc.set_tokens(&Identity::parse("file-only").unwrap(), TokenRecord::new("f"));
            true
        })
        .unwrap();

        let vault = Rc::new(FakeVault::default());
        let mut storage = TokenStorage::with_secure_store(Box::new(Rc::clone(&vault)), file);
        storage.set("keyring-only", record("k")).unwrap();

        assert_eq!(storage.list_identities().unwrap(), vec!["keyring-only"]);
    }

    #[test]
    fn deleting_last_identity_clears_keyring_entry() {
        let temp_dir = TempDir::new().unwrap();
        let vault = Rc::new(FakeVault::default());
        let mut storage =
            TokenStorage::with_secure_store(Box::new(Rc::clone(&vault)), file_store(&temp_dir));

        storage.set("a", record("1")).unwrap();
        storage.delete("a").unwrap();

        assert!(vault.value.borrow().is_none());
        assert_eq!(storage.state(), BackendState::SecureActive);
    }

    #[test]
    fn client_info_and_tokens_are_independent() {
        let temp_dir = TempDir::new().unwrap();
        let vault = Rc::new(FakeVault::default());
        let mut storage =
            TokenStorage::with_secure_store(Box::new(Rc::clone(&vault)), file_store(&temp_dir));

        storage
            .set_client_info("linear", ClientInfo::new("client-1"))
            .unwrap();
        assert_eq!(storage.get("linear").unwrap(), None);
        assert_eq!(storage.list_identities().unwrap(), vec!["linear"]);

        storage.set("linear", record("abc")).unwrap();
        assert_eq!(
            storage.get_client_info("linear").unwrap().unwrap().client_id,
            "client-1"
        );

        storage.delete("linear").unwrap();
        assert_eq!(storage.get_client_info("linear").unwrap(), None);
    }

    #[test]
    fn corrupt_fallback_document_is_surfaced() {
        let temp_dir = TempDir::new().unwrap();
        let file = file_store(&temp_dir);
        fs::create_dir_all(file.path().parent().unwrap()).unwrap();
        fs::write(file.path(), "credentials: {unclosed").unwrap();
        let mut storage = TokenStorage::file_only(file);

        assert!(matches!(storage.get("a"), Err(CxkError::Corrupt { .. })));
        assert!(matches!(
            storage.set("a", record("x")),
            Err(CxkError::Corrupt { .. })
        ));
        assert!(matches!(
            storage.list_identities(),
            Err(CxkError::Corrupt { .. })
        ));
    }

    #[test]
    fn both_backends_failing_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the credential directory should be.
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let file = FileStore::new(blocker.join("secrets.yaml"), Duration::from_millis(100));

        let vault = Rc::new(FakeVault::default());
        vault.fail_writes.set(Some(FailureKind::AccessDenied));
        let mut storage = TokenStorage::with_secure_store(Box::new(Rc::clone(&vault)), file);

        let err = storage.set("a", record("x")).unwrap_err();
        assert!(matches!(err, CxkError::BackendUnavailable(_)));
        assert!(err.is_retriable());
    }

    #[test]
    fn held_file_lock_surfaces_as_unavailable() {
        use fs2::FileExt;

        let temp_dir = TempDir::new().unwrap();
        let file = FileStore::new(
            temp_dir.path().join("secrets.yaml"),
            Duration::from_millis(100),
        );
        let lock_path = file.lock_path();
        let mut storage = TokenStorage::file_only(file);
        storage.set("jira", record("abc")).unwrap();

        let holder = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .unwrap();
        FileExt::lock_exclusive(&holder).unwrap();

        let err = storage.set("jira", record("def")).unwrap_err();
        assert!(matches!(err, CxkError::BackendUnavailable(_)));
        assert!(err.to_string().contains("lock"));

        FileExt::unlock(&holder).unwrap();
        assert_eq!(storage.get("jira").unwrap().unwrap().access_token, "abc");
    }

    #[test]
    fn from_config_with_keychain_disabled_uses_configured_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom").join("tokens.yaml");
        let config = StorageConfig {
            keychain_enabled: false,
            fallback_path: Some(path.clone()),
            ..StorageConfig::default()
        };

        let mut storage = TokenStorage::from_config(&config).unwrap();
        assert_eq!(storage.state(), BackendState::DisabledByConfig);

        storage.set("jira", TokenRecord::new("abc")).unwrap();
        assert!(path.exists());
    }
}
