//! Durable key/value storage and the session log persisted on top of it.

use super::metrics;
use crate::models::Message;
use chat_core::error::AppError;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Key under which the conversation log is stored.
pub const HISTORY_KEY: &str = "codebuddy_chat_history";

/// String key/value storage scoped to one user on one device.
///
/// Writes are synchronous: once `set` returns, the value survives a restart.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    fn remove(&self, key: &str) -> Result<(), AppError>;
}

/// One JSON file per key inside a data directory.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }
        Ok(Self { base_path })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-process storage. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, AppError> {
        self.values
            .lock()
            .map_err(|_| AppError::StorageError(anyhow::anyhow!("memory storage poisoned")))
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Ordered, append-only conversation log.
///
/// The whole log is rewritten on every mutation. There is no format
/// version: data that no longer parses is treated as an empty log.
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
    messages: Vec<Message>,
}

impl SessionStore {
    /// Open the store and restore whatever was persisted.
    pub fn open(storage: Arc<dyn KeyValueStorage>) -> Self {
        let mut store = Self {
            storage,
            messages: Vec::new(),
        };
        store.messages = store.load();
        tracing::info!(message_count = store.messages.len(), "Restored chat history");
        store
    }

    /// Read the persisted log. Missing or corrupt data yields an empty log.
    pub fn load(&self) -> Vec<Message> {
        let raw = match self.storage.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read chat history");
                metrics::record_store_error("load");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable chat history");
                metrics::record_store_error("load");
                Vec::new()
            }
        }
    }

    /// Add a message to the end of the log and persist the full log.
    ///
    /// The message is kept in memory even when the write fails.
    pub fn append(&mut self, message: Message) -> Result<(), AppError> {
        self.messages.push(message);
        self.persist()
    }

    /// Empty the log and persist the empty state.
    pub fn clear(&mut self) -> Result<(), AppError> {
        self.messages.clear();
        self.persist()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn persist(&self) -> Result<(), AppError> {
        let serialized = serde_json::to_string(&self.messages)?;
        self.storage.set(HISTORY_KEY, &serialized).map_err(|e| {
            tracing::error!(error = %e, message_count = self.messages.len(), "Failed to persist chat history");
            metrics::record_store_error("persist");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("chat-client-test-{}", Uuid::new_v4()))
    }

    #[test]
    fn file_storage_round_trips_and_removes() {
        let dir = temp_dir();
        let storage = FileStorage::new(&dir).unwrap();

        assert_eq!(storage.get("k").unwrap(), None);
        storage.set("k", "[1,2]").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("[1,2]"));
        assert!(dir.join("k.json").exists());
        assert!(!dir.join("k.json.tmp").exists());

        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
        storage.remove("k").unwrap();

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn memory_storage_clones_share_state() {
        let storage = MemoryStorage::new();
        let handle = storage.clone();

        storage.set("k", "v").unwrap();
        assert_eq!(handle.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn open_on_empty_storage_is_empty() {
        let store = SessionStore::open(Arc::new(MemoryStorage::new()));
        assert!(store.is_empty());
    }

    #[test]
    fn append_persists_full_log() {
        let storage = MemoryStorage::new();
        let mut store = SessionStore::open(Arc::new(storage.clone()));

        store.append(Message::user("one")).unwrap();
        store.append(Message::model("two", Vec::new())).unwrap();

        let raw = storage.get(HISTORY_KEY).unwrap().unwrap();
        let persisted: Vec<Message> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, store.messages());
    }

    #[test]
    fn corrupt_data_loads_as_empty() {
        let storage = MemoryStorage::new();
        storage.set(HISTORY_KEY, "{not json").unwrap();

        let store = SessionStore::open(Arc::new(storage));
        assert!(store.is_empty());
        assert!(store.load().is_empty());
    }

    #[test]
    fn clear_persists_empty_log() {
        let storage = MemoryStorage::new();
        let mut store = SessionStore::open(Arc::new(storage.clone()));
        store.append(Message::user("one")).unwrap();

        store.clear().unwrap();

        assert!(store.is_empty());
        assert_eq!(storage.get(HISTORY_KEY).unwrap().as_deref(), Some("[]"));
    }
}
