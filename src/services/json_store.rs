use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::persistence::{ChatRepository, PersistenceError};
use crate::models::Chat;

/// All chats kept as one JSON array in a single file, rewritten on every
/// write.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<Chat>, PersistenceError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, chats: &[Chat]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(chats)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ChatRepository for JsonFileStore {
    fn read_all(&self) -> Result<Vec<Chat>, PersistenceError> {
        let mut chats = self.load()?;
        chats.sort_by_key(|c| c.created_at);
        Ok(chats)
    }

    fn write(&self, chat: &Chat) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().map_err(|_| PersistenceError::LockPoisoned)?;
        let mut chats = self.load()?;
        match chats.iter_mut().find(|c| c.id == chat.id) {
            Some(existing) => *existing = chat.clone(),
            None => chats.push(chat.clone()),
        }
        self.store(&chats)
    }
}
