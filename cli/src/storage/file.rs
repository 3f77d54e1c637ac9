//! File-fallback credential storage.
//!
//! The whole credential document lives in one YAML file, by default
//! `~/.config/contextkit/secrets.yaml`. Writes follow a fixed protocol:
//! lock, read, mutate, write a `0600` temp file in the same directory,
//! rename it over the document, unlock. Readers never take the lock; they
//! can only ever observe a document that was completely written.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::storage::document::CredentialDocument;
use crate::storage::error::FileStoreError;

/// How often a blocked writer retries the lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

type FileResult<T> = std::result::Result<T, FileStoreError>;

/// Credential document stored in a permission-restricted file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    /// Creates a store for the document at `path`.
    ///
    /// Nothing is touched on disk until the first write.
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            lock_timeout,
        }
    }

    /// Location of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file carrying the advisory write lock.
    ///
    /// The document itself is replaced by rename, so it cannot hold the lock.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(|| OsString::from("secrets"), |name| name.to_os_string());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Reads the current document.
    ///
    /// A missing or blank file is an empty document.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Corrupt`] if the file does not parse or uses a
    /// newer schema, and [`FileStoreError::Io`] if it cannot be read.
    pub fn load(&self) -> FileResult<CredentialDocument> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No credential file at {}", self.path.display());
                return Ok(CredentialDocument::default());
            }
            Err(e) => return Err(FileStoreError::io(&self.path, e)),
        };

        if contents.trim().is_empty() {
            return Ok(CredentialDocument::default());
        }

        let document: CredentialDocument =
            serde_yaml::from_str(&contents).map_err(|e| FileStoreError::Corrupt {
                path: self.path.clone(),
                details: e.to_string(),
            })?;

        if !document.is_supported() {
            return Err(FileStoreError::Corrupt {
                path: self.path.clone(),
                details: format!("unsupported document version {}", document.version),
            });
        }

        Ok(document)
    }

    /// Applies `mutate` to the document under the write lock and commits it.
    ///
    /// `mutate` returns whether it changed anything; unchanged documents are
    /// not rewritten. An unreadable document is reported, never replaced.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::LockTimeout`] if another writer holds the lock
    /// too long, [`FileStoreError::Corrupt`] if the current document does not
    /// parse, and [`FileStoreError::Io`] for any filesystem failure.
    pub fn update<F>(&self, mutate: F) -> FileResult<()>
    where
        F: FnOnce(&mut CredentialDocument) -> bool,
    {
        self.ensure_parent_dir()?;

        let _lock = self.acquire_lock()?;

        let mut document = self.load()?;
        if !mutate(&mut document) {
            debug!("Credential file unchanged, skipping write");
            return Ok(());
        }

        self.replace(&document)?;
        debug!(
            "Wrote {} credential entries to {}",
            document.credentials.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Serializes to a temp file beside the document and renames it into place.
    fn replace(&self, document: &CredentialDocument) -> FileResult<()> {
        let dir = self.parent_dir();
        let yaml =
            serde_yaml::to_string(document).map_err(|e| encode_failure(&self.path, &e))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".secrets-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| FileStoreError::io(&dir, e))?;

        restrict_file(temp.as_file()).map_err(|e| FileStoreError::io(temp.path(), e))?;

        temp.write_all(yaml.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| FileStoreError::io(temp.path(), e))?;

        temp.persist(&self.path)
            .map_err(|e| FileStoreError::io(&self.path, e.error))?;

        Ok(())
    }

    /// Blocks until the sidecar lock is held or the timeout elapses.
    fn acquire_lock(&self) -> FileResult<DocumentLock> {
        let lock_path = self.lock_path();
        let file = open_lock_file(&lock_path).map_err(|e| FileStoreError::io(&lock_path, e))?;

        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(DocumentLock { file }),
                Err(e) if is_contended(&e) => {
                    if Instant::now() >= deadline {
                        warn!("Gave up waiting for {}", lock_path.display());
                        return Err(FileStoreError::LockTimeout {
                            path: lock_path,
                            timeout: self.lock_timeout,
                        });
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(FileStoreError::io(&lock_path, e)),
            }
        }
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Creates the parent directory owner-only and re-applies `0700` if it exists.
    fn ensure_parent_dir(&self) -> FileResult<()> {
        let dir = self.parent_dir();
        if !dir.is_dir() {
            create_private_dir(&dir).map_err(|e| FileStoreError::io(&dir, e))?;
            debug!("Created credential directory {}", dir.display());
            return Ok(());
        }

        if let Err(e) = restrict_dir(&dir) {
            warn!("Could not restrict permissions on {}: {e}", dir.display());
        }
        Ok(())
    }
}

/// Exclusive advisory lock, released on drop.
struct DocumentLock {
    file: File,
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release credential file lock: {e}");
        }
    }
}

/// An encode failure says nothing about the file on disk, so it is not `Corrupt`.
fn encode_failure(path: &Path, err: &serde_yaml::Error) -> FileStoreError {
    FileStoreError::io(
        path,
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("cannot encode credential document: {err}"),
        ),
    )
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).read(true).write(true).truncate(false);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }

    options.open(path)
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(dir)?;
    restrict_dir(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Sets `0700` on a directory. Sticky shared directories such as `/tmp` are left alone.
///
/// Re-applying the mode to an existing directory is best effort: the caller
/// logs a failure (say, a directory owned by another user) and still writes,
/// since the document itself is always created `0600`.
#[cfg(unix)]
fn restrict_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(dir)?.permissions().mode();
    if mode & 0o1000 != 0 {
        return Ok(());
    }
    if mode & 0o777 != DIR_MODE {
        fs::set_permissions(dir, fs::Permissions::from_mode(DIR_MODE))?;
    }
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn restrict_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn restrict_file(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(FILE_MODE))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn restrict_file(_file: &File) -> io::Result<()> {
    Ok(())
}
