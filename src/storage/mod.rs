//! Persistent storage seams: key-value records, filter rules, legacy files

pub mod local;
pub mod memory;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

use crate::models::{FilterId, LegacyFilterEntry};
use async_trait::async_trait;
use thiserror::Error;

/// Well-known keys in the persisted key-value store.
pub mod keys {
    /// Version marker written on every process start.
    pub const APP_VERSION: &str = "app-version";
    /// Legacy aggregate blob holding every filter's metadata (pre-1.0.3.0).
    pub const FILTERS_INFO: &str = "filters-info";
    /// Per-filter install/enable flags (since 1.0.3.0).
    pub const FILTERS_STATE: &str = "filters-state";
    /// Per-filter version info (since 1.0.3.0).
    pub const FILTERS_VERSION: &str = "filters-version";
    /// JSON list of whitelisted domains (since 2.0.9).
    pub const WHITE_LIST_DOMAINS: &str = "white-list-domains";
    /// Obsolete ip-resolver cache, dropped at 2.0.0.
    pub const IP_RESOLVER_CACHE: &str = "ip-cache";
    /// Per-rule hit counters owned by the statistics collaborator.
    pub const FILTERS_HIT_COUNT: &str = "filters-hit-count";
}

/// Combined rules dump used before per-filter records existed.
pub const COMBINED_RULES_FILE: &str = "filters.ini";

/// Legacy per-filter rule file used by the pre-2.3.5 chromium backend.
pub fn legacy_rules_file(filter_id: FilterId) -> String {
    format!("filterrules_{}.txt", filter_id)
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("malformed persisted record '{key}': {source}")]
    MalformedRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed combined rules dump at line {line}: {reason}")]
    MalformedDump { line: usize, reason: String },
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// The host's persistent key-value store: string keys, string/JSON values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
    async fn has(&self, key: &str) -> Result<bool, StorageError>;
}

/// Rule text keyed by filter id, plus the pre-split combined dump.
#[async_trait]
pub trait RulesStore: Send + Sync {
    /// Ordered rule lines for one filter, `None` when never written.
    async fn read(&self, filter_id: FilterId) -> Result<Option<Vec<String>>, StorageError>;
    async fn write(&self, filter_id: FilterId, lines: &[String]) -> Result<(), StorageError>;
    /// Every filter in the legacy combined store; empty when absent.
    async fn read_legacy_dump(&self) -> Result<Vec<LegacyFilterEntry>, StorageError>;
}

/// Path-addressed legacy file store, read only as a migration source.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn read_lines(&self, path: &str) -> Result<Vec<String>, StorageError>;
    async fn remove(&self, path: &str) -> Result<(), StorageError>;
}

/// Opaque hit-statistics collaborator.
#[async_trait]
pub trait HitStats: Send + Sync {
    async fn cleanup(&self) -> Result<(), StorageError>;
}
