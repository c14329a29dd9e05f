//! Directory-backed blob store with atomic whole-file rewrites.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{BlobStore, StoreError, StoreResult};

/// Default number of attempts for a single write.
pub const DEFAULT_WRITE_ATTEMPTS: u32 = 3;

const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// A blob store that keeps one file per blob under a directory.
///
/// Writes go to a temp file in the same directory, are fsynced, then
/// renamed over the target, so a crash mid-write leaves either the old or
/// the new file. Failed writes are retried a bounded number of times.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    write_attempts: u32,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Write {
            path: dir.clone(),
            attempts: 1,
            source,
        })?;
        Ok(Self {
            dir,
            write_attempts: DEFAULT_WRITE_ATTEMPTS,
        })
    }

    /// Sets how many times a write is attempted before failing (min 1).
    pub fn with_write_attempts(mut self, attempts: u32) -> Self {
        self.write_attempts = attempts.max(1);
        self
    }

    /// Returns the root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path backing blob `name`.
    pub fn path_of(&self, name: &str) -> StoreResult<PathBuf> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name == "."
            || name == ".."
        {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }

    fn write_once(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl BlobStore for FileStore {
    fn load(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_of(name)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    fn save(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.path_of(name)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.write_once(&path, data) {
                Ok(()) => {
                    debug!(path = %path.display(), bytes = data.len(), "blob saved");
                    return Ok(());
                }
                Err(source) if attempt >= self.write_attempts => {
                    return Err(StoreError::Write {
                        path,
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), attempt, error = %e, "blob write failed, retrying");
                    thread::sleep(RETRY_BACKOFF * attempt);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_blob_loads_as_none() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.load("patients.json").unwrap(), None);
    }

    #[test]
    fn save_replaces_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.save("patients.json", b"{\"a\":1}").unwrap();
        store.save("patients.json", b"{}").unwrap();

        assert_eq!(store.load("patients.json").unwrap(), Some(b"{}".to_vec()));
        let on_disk = std::fs::read(dir.path().join("patients.json")).unwrap();
        assert_eq!(on_disk, b"{}");
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        for i in 0..5 {
            store.save("doctors.json", format!("{i}").as_bytes()).unwrap();
        }
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::open(&nested).unwrap();
        store.save("t.json", b"[]").unwrap();
        assert!(nested.join("t.json").exists());
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.save("../escape.json", b"x"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(store.load(""), Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn write_failure_reports_attempts() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap().with_write_attempts(2);
        // A directory in place of the target makes rename fail.
        std::fs::create_dir(dir.path().join("blocked.json")).unwrap();
        std::fs::write(dir.path().join("blocked.json").join("keep"), b"x").unwrap();

        match store.save("blocked.json", b"data") {
            Err(StoreError::Write { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected write error, got {other:?}"),
        }
    }
}
