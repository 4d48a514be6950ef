//! Durable conversation history.
//!
//! The whole conversation is stored as a single JSON blob under a fixed key.
//! Every append rewrites the blob; there is no incremental diffing and no
//! versioning. Restoring is a pure read and never writes back.

use crate::core::message::ChatTurn;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub const DEFAULT_HISTORY_KEY: &str = "chat_history";

#[derive(Debug)]
pub enum StorageError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Encode(serde_json::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io { path, source } => {
                write!(f, "Failed to access history at {}: {}", path.display(), source)
            }
            StorageError::Encode(source) => write!(f, "Failed to encode history: {source}"),
        }
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StorageError::Io { source, .. } => Some(source),
            StorageError::Encode(source) => Some(source),
        }
    }
}

/// Key/blob storage backing the conversation store.
pub trait SnapshotStore: Send {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&mut self, key: &str, blob: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Stores each key as `<dir>/<key>.json`, replacing files atomically.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_stem: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_stem}.json"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn save(&mut self, key: &str, blob: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let io_err = |source| StorageError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        temp_file.write_all(blob.as_bytes()).map_err(io_err)?;
        temp_file.as_file_mut().sync_all().map_err(io_err)?;
        temp_file.persist(&path).map_err(|err| io_err(err.error))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

/// Process-local storage, used for ephemeral sessions and tests.
///
/// Clones share the same entries, so a handle kept outside a
/// [`ConversationStore`] observes its writes.
#[derive(Debug, Default, Clone)]
pub struct MemorySnapshotStore {
    inner: Arc<Mutex<MemoryEntries>>,
}

#[derive(Debug, Default)]
struct MemoryEntries {
    entries: HashMap<String, String>,
    writes: usize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, blob: &str) -> Self {
        let store = Self::default();
        store
            .inner
            .lock()
            .unwrap()
            .entries
            .insert(key.to_string(), blob.to_string());
        store
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().entries.get(key).cloned()
    }

    /// Number of `save` calls seen so far.
    pub fn writes(&self) -> usize {
        self.inner.lock().unwrap().writes
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(key))
    }

    fn save(&mut self, key: &str, blob: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.writes += 1;
        inner.entries.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.inner.lock().unwrap().entries.remove(key);
        Ok(())
    }
}

pub struct ConversationStore {
    turns: Vec<ChatTurn>,
    storage: Box<dyn SnapshotStore>,
    key: String,
}

impl ConversationStore {
    pub fn new(storage: Box<dyn SnapshotStore>, key: impl Into<String>) -> Self {
        Self {
            turns: Vec::new(),
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn storage(&self) -> &dyn SnapshotStore {
        self.storage.as_ref()
    }

    pub fn into_storage(self) -> Box<dyn SnapshotStore> {
        self.storage
    }

    /// Appends a turn and rewrites the durable snapshot.
    ///
    /// The turn stays in memory even when the write fails, so the
    /// conversation remains usable; the error is returned for reporting.
    pub fn append(&mut self, turn: ChatTurn) -> Result<(), StorageError> {
        self.turns.push(turn);
        self.persist()
    }

    /// Replaces the in-memory sequence with the durable snapshot.
    ///
    /// Missing, unreadable or unparsable snapshots yield an empty history.
    pub fn restore(&mut self) -> &[ChatTurn] {
        self.turns = match self.storage.load(&self.key) {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<ChatTurn>>(&blob) {
                Ok(turns) => turns,
                Err(err) => {
                    warn!(key = %self.key, error = %err, "discarding unparsable chat history");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(key = %self.key, error = %err, "chat history could not be read");
                Vec::new()
            }
        };
        debug!(key = %self.key, turns = self.turns.len(), "restored chat history");
        &self.turns
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.turns.clear();
        self.storage.remove(&self.key)
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        let blob = serde_json::to_string(&self.turns).map_err(StorageError::Encode)?;
        self.storage.save(&self.key, &blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Sender;
    use tempfile::TempDir;

    fn memory_store() -> ConversationStore {
        ConversationStore::new(Box::new(MemorySnapshotStore::new()), DEFAULT_HISTORY_KEY)
    }

    fn reload(store: ConversationStore) -> ConversationStore {
        let key = store.key().to_string();
        let mut reloaded = ConversationStore::new(store.into_storage(), key);
        reloaded.restore();
        reloaded
    }

    #[test]
    fn restore_without_snapshot_is_empty() {
        let mut store = memory_store();
        assert!(store.restore().is_empty());
    }

    #[test]
    fn appended_turns_survive_reload_in_order() {
        let mut store = memory_store();
        store.append(ChatTurn::user("first").unwrap()).unwrap();
        store.append(ChatTurn::bot("second")).unwrap();
        store.append(ChatTurn::bot_error("third")).unwrap();
        let expected = store.turns().to_vec();

        let reloaded = reload(store);
        assert_eq!(reloaded.turns(), expected.as_slice());
        assert_eq!(reloaded.turns()[0].sender(), Sender::User);
    }

    #[test]
    fn restore_does_not_write() {
        let blob = r#"[{"text":"hi","sender":"user","timestamp":"2024-01-01T00:00:00.000Z"}]"#;
        let handle = MemorySnapshotStore::with_entry(DEFAULT_HISTORY_KEY, blob);
        let mut store = ConversationStore::new(Box::new(handle.clone()), DEFAULT_HISTORY_KEY);
        assert_eq!(store.restore().len(), 1);
        assert_eq!(store.restore().len(), 1);

        assert_eq!(handle.writes(), 0);
        assert_eq!(handle.get(DEFAULT_HISTORY_KEY).as_deref(), Some(blob));
    }

    #[test]
    fn every_append_overwrites_the_full_snapshot() {
        let mut store = memory_store();
        store.append(ChatTurn::user("one").unwrap()).unwrap();
        store.append(ChatTurn::bot("two")).unwrap();

        let blob = store
            .storage()
            .load(DEFAULT_HISTORY_KEY)
            .unwrap()
            .expect("snapshot");
        let records: Vec<serde_json::Value> = serde_json::from_str(&blob).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["sender"], "bot");
        assert_eq!(records[1]["text"], "two");
    }

    #[test]
    fn corrupt_snapshot_restores_as_empty() {
        for blob in ["not json", "{\"text\":1}", "[{\"sender\":\"robot\"}]"] {
            let mut store = ConversationStore::new(
                Box::new(MemorySnapshotStore::with_entry(DEFAULT_HISTORY_KEY, blob)),
                DEFAULT_HISTORY_KEY,
            );
            assert!(store.restore().is_empty(), "blob {blob:?} should be ignored");
        }
    }

    #[test]
    fn clear_wipes_memory_and_snapshot() {
        let mut store = memory_store();
        store.append(ChatTurn::user("hello").unwrap()).unwrap();
        store.clear().unwrap();

        assert!(store.is_empty());
        assert!(store.storage().load(DEFAULT_HISTORY_KEY).unwrap().is_none());
        assert!(reload(store).is_empty());
    }

    #[test]
    fn file_store_round_trips_and_removes() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join("nested");
        let mut store = ConversationStore::new(
            Box::new(FileSnapshotStore::new(&dir)),
            DEFAULT_HISTORY_KEY,
        );
        store.append(ChatTurn::user("What is X?").unwrap()).unwrap();
        store.append(ChatTurn::bot("X is Y.")).unwrap();
        let expected = store.turns().to_vec();

        let path = FileSnapshotStore::new(&dir).path_for(DEFAULT_HISTORY_KEY);
        assert!(path.exists());

        let mut reloaded = reload(store);
        assert_eq!(reloaded.turns(), expected.as_slice());

        reloaded.clear().unwrap();
        assert!(!path.exists());
        // Clearing twice is fine.
        reloaded.clear().unwrap();
    }

    #[test]
    fn file_store_sanitizes_keys() {
        let store = FileSnapshotStore::new("/tmp/history");
        assert_eq!(
            store.path_for("../chat history"),
            PathBuf::from("/tmp/history/___chat_history.json")
        );
    }
}
