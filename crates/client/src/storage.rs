//! Persistent key/value storage.
//!
//! The session and a couple of navigation hints survive restarts through a
//! [`KeyValueStore`]:
//! - [`FileStore`]: one JSON file per key in the platform-appropriate config
//!   directory (`~/.config/getyourshare/` on Linux,
//!   `~/Library/Application Support/getyourshare/` on macOS,
//!   `%APPDATA%\getyourshare\` on Windows)
//! - [`MemoryStore`]: process-local map, used when no directory is available
//!   and in tests

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};

/// Raw string storage. Implementations never panic; failures are logged and
/// reported through the return value.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Returns `true` if the value was written.
    fn set(&self, key: &str, value: &str) -> bool;

    fn remove(&self, key: &str);

    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Save a value as JSON. Returns `true` if the operation succeeded.
pub fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => store.set(key, &json),
        Err(e) => {
            crate::log_error!("Failed to serialize '{}': {}", key, e);
            false
        }
    }
}

/// Load a JSON value. Returns `None` if the key doesn't exist or
/// deserialization fails.
pub fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let json = store.get(key)?;
    serde_json::from_str(&json).ok()
}

// =========================================
// File-backed implementation
// =========================================

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store rooted at `dir`; the directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_path(&self, key: &str) -> PathBuf {
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.dir.join(format!("{}.json", safe_key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.file_path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        if !self.dir.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.dir) {
                crate::log_error!("Cannot create storage dir {}: {}", self.dir.display(), e);
                return false;
            }
        }
        match std::fs::write(self.file_path(key), value) {
            Ok(()) => true,
            Err(e) => {
                crate::log_error!("Cannot write '{}': {}", key, e);
                false
            }
        }
    }

    fn remove(&self, key: &str) {
        let path = self.file_path(key);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                crate::log_warn!("Cannot remove '{}': {}", key, e);
            }
        }
    }
}

// =========================================
// In-memory implementation
// =========================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), value.to_string());
                true
            }
            Err(_) => false,
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}
