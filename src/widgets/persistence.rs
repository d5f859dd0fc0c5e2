// src/widgets/persistence.rs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub const LEADERBOARD_USERNAME_KEY: &str = "leaderboard_username";
pub const LEADERBOARD_ATTEMPTS_KEY: &str = "leaderboard_attempts";
pub const FINGERPRINT_LOGS_KEY: &str = "fingerprint_logs";
pub const CHAT_LAST_READ_KEY: &str = "chat_last_read";
pub const PROFILE_PICTURE_URL_KEY: &str = "profile_picture_url";
pub const QUIZ_KEY_PREFIX: &str = "quiz_progress:";

/// Storage key of the quiz progress for one page.
pub fn quiz_key(page_path: &str) -> String {
    let path = page_path.trim();
    let path = if path.is_empty() { "/" } else { path };
    format!("{QUIZ_KEY_PREFIX}{path}")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode value: {0}")]
    Encode(String),
}

pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// In-memory backend with an optional byte quota over keys plus values.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.lock();
        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

/// JSON values on top of a [`StorageBackend`] (the browser's `localStorage`, or
/// [`MemoryBackend`]). Several widgets share one backend without locking; the last
/// writer wins.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn StorageBackend>,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Missing and unreadable values both come back as `None`; unreadable ones are logged.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.backend.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, "Ignoring corrupt stored value: {}", e);
                None
            }
        }
    }

    /// Stores a value. When the backend is full, frees space with [`LocalStore::cleanup`]
    /// and tries once more.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|e| StorageError::Encode(e.to_string()))?;
        match self.backend.set(key, &raw) {
            Err(StorageError::QuotaExceeded) => {
                let freed = self.cleanup(key);
                tracing::warn!(key, freed, "Storage quota exceeded, retrying after cleanup");
                self.backend.set(key, &raw)
            }
            other => other,
        }
    }

    pub fn remove(&self, key: &str) {
        self.backend.remove(key);
    }

    /// Drops disposable data: the fingerprint log and saved progress of other quiz pages.
    /// Returns the number of keys removed.
    pub fn cleanup(&self, keep: &str) -> usize {
        let disposable: Vec<String> = self
            .backend
            .keys()
            .into_iter()
            .filter(|k| k != keep)
            .filter(|k| k == FINGERPRINT_LOGS_KEY || k.starts_with(QUIZ_KEY_PREFIX))
            .collect();
        for key in &disposable {
            self.backend.remove(key);
        }
        disposable.len()
    }
}
