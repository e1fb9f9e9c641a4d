//! Persistence tiers for [`Session`] blobs.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{AuthError, AuthResult, Session};

/// One place a session can be persisted.
pub trait SessionStorage: Send + Sync {
    fn load_session(&self) -> AuthResult<Option<Session>>;
    fn save_session(&self, session: &Session) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Keeps the serialized blob in process memory.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    blob: Mutex<Option<String>>,
}

impl MemorySessionStorage {
    fn with_blob<R>(&self, apply: impl FnOnce(&mut Option<String>) -> R) -> R {
        let mut blob = self
            .blob
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        apply(&mut blob)
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load_session(&self) -> AuthResult<Option<Session>> {
        self.with_blob(|blob| {
            blob.as_deref()
                .map(serde_json::from_str::<Session>)
                .transpose()
                .map_err(AuthError::from)
        })
    }

    fn save_session(&self, session: &Session) -> AuthResult<()> {
        let encoded = serde_json::to_string(session)?;
        self.with_blob(|blob| *blob = Some(encoded));
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        self.with_blob(|blob| *blob = None);
        Ok(())
    }
}

/// Stores the blob as a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileSessionStorage {
    fn load_session(&self) -> AuthResult<Option<Session>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(storage_error(&self.path, &error)),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save_session(&self, session: &Session) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|error| storage_error(parent, &error))?;
        }
        let encoded = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, encoded).map_err(|error| storage_error(&self.path, &error))
    }

    fn clear_session(&self) -> AuthResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(storage_error(&self.path, &error)),
        }
    }
}

fn storage_error(path: &Path, error: &std::io::Error) -> AuthError {
    AuthError::Storage(format!("{}: {error}", path.display()))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::session::Identity;

    fn session() -> Session {
        Session {
            identity: Identity::Local {
                username: "admin".to_string(),
            },
            login_time: Utc::now(),
            remember_me: true,
        }
    }

    #[test]
    fn file_storage_saves_loads_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSessionStorage::new(dir.path().join("nested/session.json"));
        assert_eq!(storage.load_session().unwrap(), None);

        let session = session();
        storage.save_session(&session).unwrap();
        assert_eq!(storage.load_session().unwrap(), Some(session));

        storage.clear_session().unwrap();
        storage.clear_session().unwrap();
        assert_eq!(storage.load_session().unwrap(), None);
    }

    #[test]
    fn file_storage_reports_corrupt_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let storage = FileSessionStorage::new(&path);
        assert!(matches!(storage.load_session(), Err(AuthError::Json(_))));
    }

    #[test]
    fn memory_storage_replaces_previous_blob() {
        let storage = MemorySessionStorage::default();
        storage.save_session(&session()).unwrap();
        let newer = session();
        storage.save_session(&newer).unwrap();
        assert_eq!(storage.load_session().unwrap(), Some(newer));
    }
}
