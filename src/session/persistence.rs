//! Atomic file-based storage for the session store.
//!
//! Transcripts are written as pretty JSON through a temp-file-and-rename
//! dance so a crash mid-write never leaves a torn file, with an exclusive
//! lock file guarding against concurrent seminar instances. Files that turn
//! out corrupted or carry an incompatible schema version are deleted with a
//! warning and replaced by a fresh store.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::SessionStore;
use crate::error::{Result, SeminarError};

/// Current schema version of the sessions file.
/// Increment when making breaking changes to the serialization format.
pub const SESSIONS_SCHEMA_VERSION: u32 = 1;

/// Default sessions file name.
const SESSIONS_FILE: &str = "sessions.json";

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// Lock file suffix for concurrent access prevention.
const LOCK_SUFFIX: &str = ".lock";

/// On-disk shape: the store wrapped with its schema version.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStore {
    version: u32,
    #[serde(default)]
    store: SessionStore,
}

/// Session persistence manager providing atomic file operations.
#[derive(Debug, Clone)]
pub struct SessionPersistence {
    /// Directory where session files are stored.
    dir: PathBuf,
}

impl SessionPersistence {
    /// Creates a persistence manager storing files under `dir`.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// The platform-default storage directory.
    pub fn default_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join("seminar"))
            .ok_or_else(|| SeminarError::session("could not determine a data directory"))
    }

    /// Returns the path to the sessions file.
    #[must_use]
    pub fn sessions_file_path(&self) -> PathBuf {
        self.dir.join(SESSIONS_FILE)
    }

    /// Returns the path to the temporary file used for atomic writes.
    #[must_use]
    pub fn tmp_file_path(&self) -> PathBuf {
        self.dir.join(format!("{SESSIONS_FILE}{TMP_SUFFIX}"))
    }

    /// Returns the path to the lock file.
    #[must_use]
    pub fn lock_file_path(&self) -> PathBuf {
        self.dir.join(format!("{SESSIONS_FILE}{LOCK_SUFFIX}"))
    }

    /// Saves the store atomically.
    pub fn save(&self, store: &SessionStore) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let lock_file = File::create(self.lock_file_path())?;
        FileExt::lock_exclusive(&lock_file)
            .map_err(|e| SeminarError::session(format!("failed to acquire sessions lock: {e}")))?;

        let persisted = PersistedStore {
            version: SESSIONS_SCHEMA_VERSION,
            store: store.clone(),
        };
        let json = serde_json::to_string_pretty(&persisted)?;

        let tmp_path = self.tmp_file_path();
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;

        fs::rename(&tmp_path, self.sessions_file_path())?;

        Ok(())
    }

    /// Loads the store from disk.
    ///
    /// A missing file yields an empty store. Corrupted files and files with
    /// an incompatible schema version are deleted with a warning, also
    /// yielding an empty store.
    pub fn load(&self) -> Result<SessionStore> {
        let sessions_path = self.sessions_file_path();
        if !sessions_path.exists() {
            return Ok(SessionStore::new());
        }

        let lock_path = self.lock_file_path();
        if lock_path.exists() {
            let lock_file = File::open(&lock_path)?;
            FileExt::lock_shared(&lock_file).map_err(|e| {
                SeminarError::session(format!("failed to acquire sessions lock: {e}"))
            })?;
        }

        let mut file = match File::open(&sessions_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SessionStore::new()),
            Err(e) => return Err(e.into()),
        };

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let persisted: PersistedStore = match serde_json::from_str(&contents) {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(
                    "Corrupted sessions file at {}: {}. Deleting and starting fresh.",
                    sessions_path.display(),
                    e
                );
                let _ = fs::remove_file(&sessions_path);
                return Ok(SessionStore::new());
            }
        };

        if persisted.version != SESSIONS_SCHEMA_VERSION {
            warn!(
                "Incompatible sessions file version {} (supported: {}). Starting fresh.",
                persisted.version, SESSIONS_SCHEMA_VERSION
            );
            let _ = fs::remove_file(&sessions_path);
            return Ok(SessionStore::new());
        }

        Ok(persisted.store)
    }

    /// Deletes the sessions file if it exists.
    pub fn delete(&self) -> Result<()> {
        let sessions_path = self.sessions_file_path();
        if sessions_path.exists() {
            fs::remove_file(&sessions_path)?;
        }
        Ok(())
    }

    /// Checks if a sessions file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.sessions_file_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MessageRole;
    use tempfile::TempDir;

    fn test_persistence() -> (SessionPersistence, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let persistence = SessionPersistence::new(temp_dir.path().join("seminar"));
        (persistence, temp_dir)
    }

    /// Test that saving creates the file.
    #[test]
    fn test_persistence_save_creates_file() {
        let (persistence, _temp_dir) = test_persistence();
        let store = SessionStore::new();

        assert!(!persistence.exists());
        persistence.save(&store).expect("save should succeed");
        assert!(persistence.exists());
    }

    /// Test loading a missing file yields an empty store.
    #[test]
    fn test_persistence_load_missing_yields_empty() {
        let (persistence, _temp_dir) = test_persistence();
        let store = persistence.load().expect("load should not error");
        assert!(store.is_empty());
    }

    /// Test that a saved store comes back intact.
    #[test]
    fn test_persistence_save_and_load_roundtrip() {
        let (persistence, _temp_dir) = test_persistence();

        let mut store = SessionStore::new();
        store.create_session(Some("exam prep"));
        store.add_message(MessageRole::User, "What is spaced repetition?");
        store.add_message(MessageRole::Assistant, "A scheduling technique.");

        persistence.save(&store).expect("save should succeed");
        let loaded = persistence.load().expect("load should succeed");

        assert_eq!(loaded, store);
        assert_eq!(loaded.active_session().unwrap().messages.len(), 2);
    }

    /// Test that a corrupted file is deleted and replaced with a fresh store.
    #[test]
    fn test_persistence_recovers_from_corruption() {
        let (persistence, _temp_dir) = test_persistence();
        fs::create_dir_all(persistence.sessions_file_path().parent().unwrap()).unwrap();
        fs::write(persistence.sessions_file_path(), "{ not json").unwrap();

        let store = persistence.load().expect("load should recover");
        assert!(store.is_empty());
        assert!(!persistence.exists());
    }

    /// Test that an incompatible schema version starts fresh.
    #[test]
    fn test_persistence_rejects_incompatible_version() {
        let (persistence, _temp_dir) = test_persistence();
        fs::create_dir_all(persistence.sessions_file_path().parent().unwrap()).unwrap();
        fs::write(
            persistence.sessions_file_path(),
            r#"{"version": 99, "store": {"sessions": [], "active": null}}"#,
        )
        .unwrap();

        let store = persistence.load().expect("load should recover");
        assert!(store.is_empty());
        assert!(!persistence.exists());
    }

    /// Test that saving twice overwrites cleanly.
    #[test]
    fn test_persistence_overwrites_previous_save() {
        let (persistence, _temp_dir) = test_persistence();

        let mut store = SessionStore::new();
        store.create_session(Some("first"));
        persistence.save(&store).unwrap();

        store.create_session(Some("second"));
        persistence.save(&store).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.len(), 2);
    }

    /// Test deleting the sessions file.
    #[test]
    fn test_persistence_delete() {
        let (persistence, _temp_dir) = test_persistence();
        persistence.save(&SessionStore::new()).unwrap();
        assert!(persistence.exists());

        persistence.delete().expect("delete should succeed");
        assert!(!persistence.exists());
        // Deleting again is a no-op.
        persistence.delete().expect("repeat delete should succeed");
    }
}
