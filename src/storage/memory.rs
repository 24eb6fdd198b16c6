//! In-memory backend for tests and dry runs

use super::{FileStore, HitStats, KeyValueStore, RulesStore, StorageError};
use crate::models::{FilterId, LegacyFilterEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Implements every storage seam over plain maps. Intended for tests and
/// the CLI's dry-run mode; nothing survives the process.
#[derive(Default)]
pub struct MemoryStorage {
    kv: Mutex<HashMap<String, String>>,
    rules: Mutex<HashMap<FilterId, Vec<String>>>,
    legacy_dump: Mutex<Vec<LegacyFilterEntry>>,
    files: Mutex<HashMap<String, String>>,
    cleanups: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the pre-split combined rules dump.
    pub async fn seed_legacy_dump(&self, entries: Vec<LegacyFilterEntry>) {
        *self.legacy_dump.lock().await = entries;
    }

    /// Seed a legacy file's contents.
    pub async fn seed_file(&self, path: &str, contents: &str) {
        self.files
            .lock()
            .await
            .insert(path.to_string(), contents.to_string());
    }

    pub async fn file_exists(&self, path: &str) -> bool {
        self.files.lock().await.contains_key(path)
    }

    /// How many times the hit-statistics cleanup ran.
    pub fn cleanup_count(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.kv.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.kv
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.kv.lock().await.remove(key);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.kv.lock().await.contains_key(key))
    }
}

#[async_trait]
impl RulesStore for MemoryStorage {
    async fn read(&self, filter_id: FilterId) -> Result<Option<Vec<String>>, StorageError> {
        Ok(self.rules.lock().await.get(&filter_id).cloned())
    }

    async fn write(&self, filter_id: FilterId, lines: &[String]) -> Result<(), StorageError> {
        self.rules.lock().await.insert(filter_id, lines.to_vec());
        Ok(())
    }

    async fn read_legacy_dump(&self) -> Result<Vec<LegacyFilterEntry>, StorageError> {
        Ok(self.legacy_dump.lock().await.clone())
    }
}

#[async_trait]
impl FileStore for MemoryStorage {
    async fn read_lines(&self, path: &str) -> Result<Vec<String>, StorageError> {
        match self.files.lock().await.get(path) {
            Some(contents) => Ok(contents
                .split(['\r', '\n'])
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        match self.files.lock().await.remove(path) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }
}

#[async_trait]
impl HitStats for MemoryStorage {
    async fn cleanup(&self) -> Result<(), StorageError> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        self.kv.lock().await.remove(super::keys::FILTERS_HIT_COUNT);
        Ok(())
    }
}
