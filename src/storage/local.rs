//! File-backed backend over a profile directory
//!
//! Key-value records live in one `storage.json` replaced atomically on every
//! write; each filter's rules live in their own `filter_<id>.txt`.

use super::{
    keys, FileStore, HitStats, KeyValueStore, RulesStore, StorageError, COMBINED_RULES_FILE,
};
use crate::models::{FilterId, LegacyFilterEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

const KV_FILE: &str = "storage.json";

/// Marks a filter section header in the combined rules dump.
const DUMP_HEADER: &str = "! FILTER";

pub struct LocalStorage {
    dir: PathBuf,
    kv: Mutex<HashMap<String, String>>,
}

impl LocalStorage {
    /// Open (or create) a profile directory and load its key-value records.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let kv_path = dir.join(KV_FILE);
        let map = match tokio::fs::read_to_string(&kv_path).await {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| StorageError::MalformedRecord {
                    key: KV_FILE.to_string(),
                    source: e,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            dir,
            kv: Mutex::new(map),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn rules_path(&self, filter_id: FilterId) -> PathBuf {
        self.dir.join(format!("filter_{}.txt", filter_id))
    }

    /// Legacy file paths are flattened to their final component, so a dump
    /// cannot address anything outside the profile directory.
    fn legacy_path(&self, path: &str) -> PathBuf {
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        self.dir.join(name)
    }

    async fn flush(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        let data = serde_json::to_string_pretty(map)?;
        let dir = self.dir.clone();
        let target = self.dir.join(KV_FILE);
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(data.as_bytes())?;
            tmp.persist(&target).map_err(|e| StorageError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}

#[async_trait]
impl KeyValueStore for LocalStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.kv.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.kv.lock().await;
        map.insert(key.to_string(), value.to_string());
        self.flush(&map).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.kv.lock().await;
        if map.remove(key).is_some() {
            self.flush(&map).await?;
        }
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.kv.lock().await.contains_key(key))
    }
}

#[async_trait]
impl RulesStore for LocalStorage {
    async fn read(&self, filter_id: FilterId) -> Result<Option<Vec<String>>, StorageError> {
        match tokio::fs::read_to_string(self.rules_path(filter_id)).await {
            Ok(contents) => Ok(Some(contents.lines().map(str::to_string).collect())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, filter_id: FilterId, lines: &[String]) -> Result<(), StorageError> {
        let contents = lines.join("\n");
        tokio::fs::write(self.rules_path(filter_id), contents).await?;
        Ok(())
    }

    async fn read_legacy_dump(&self) -> Result<Vec<LegacyFilterEntry>, StorageError> {
        match tokio::fs::read_to_string(self.dir.join(COMBINED_RULES_FILE)).await {
            Ok(contents) => parse_legacy_dump(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FileStore for LocalStorage {
    async fn read_lines(&self, path: &str) -> Result<Vec<String>, StorageError> {
        match tokio::fs::read_to_string(self.legacy_path(path)).await {
            Ok(contents) => Ok(contents
                .split(['\r', '\n'])
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.legacy_path(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl HitStats for LocalStorage {
    async fn cleanup(&self) -> Result<(), StorageError> {
        KeyValueStore::remove(self, keys::FILTERS_HIT_COUNT).await
    }
}

/// Parse the combined rules dump: `! FILTER` header lines carrying
/// `key=value` metadata, each followed by that filter's rule lines.
fn parse_legacy_dump(contents: &str) -> Result<Vec<LegacyFilterEntry>, StorageError> {
    let mut entries: Vec<LegacyFilterEntry> = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim_end_matches('\r');

        if let Some(meta) = line.strip_prefix(DUMP_HEADER) {
            let mut filter_id: Option<FilterId> = None;
            let mut version = String::new();
            let mut last_check_time = 0;
            let mut last_update_time = 0;
            let mut disabled = false;

            for token in meta.split_whitespace() {
                let (key, value) =
                    token
                        .split_once('=')
                        .ok_or_else(|| StorageError::MalformedDump {
                            line: line_no,
                            reason: format!("expected key=value, got '{}'", token),
                        })?;
                match key {
                    "id" => {
                        filter_id =
                            Some(value.parse().map_err(|_| StorageError::MalformedDump {
                                line: line_no,
                                reason: format!("invalid filter id '{}'", value),
                            })?)
                    }
                    "version" => version = value.to_string(),
                    "checked" => last_check_time = value.parse().unwrap_or(0),
                    "updated" => last_update_time = value.parse().unwrap_or(0),
                    "disabled" => disabled = value == "1" || value == "true",
                    _ => {}
                }
            }

            let filter_id = filter_id.ok_or_else(|| StorageError::MalformedDump {
                line: line_no,
                reason: "filter header without id".to_string(),
            })?;
            entries.push(LegacyFilterEntry {
                filter_id,
                version,
                last_check_time,
                last_update_time,
                disabled,
                rules: Vec::new(),
            });
        } else if line.is_empty() {
            continue;
        } else {
            match entries.last_mut() {
                Some(entry) => entry.rules.push(line.to_string()),
                None => {
                    return Err(StorageError::MalformedDump {
                        line: line_no,
                        reason: "rule line before any filter header".to_string(),
                    })
                }
            }
        }
    }

    Ok(entries)
}
