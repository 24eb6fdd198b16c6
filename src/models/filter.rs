//! Filter metadata records, legacy and current schema

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type FilterId = u32;

/// The user's own rules live under a reserved pseudo-filter id.
pub const USER_FILTER_ID: FilterId = 0;
/// Search-ads and self-promotion filter.
pub const SEARCH_AND_SELF_PROMO_FILTER_ID: FilterId = 10;
/// Whitelisted-domains pseudo-filter.
pub const WHITE_LIST_FILTER_ID: FilterId = 100;

/// Per-filter metadata as stored in the legacy aggregate blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFilterInfo {
    pub version: String,
    pub last_check_time: u64,
    pub last_update_time: u64,
    pub disabled: bool,
}

/// The aggregate blob: every filter's metadata keyed by filter id.
pub type LegacyFilterMap = BTreeMap<FilterId, LegacyFilterInfo>;

/// Install/enable flags, one record per filter since schema 1.0.3.0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStateInfo {
    pub installed: bool,
    pub enabled: bool,
    pub loaded: bool,
}

/// Version and update timestamps, one record per filter since 1.0.3.0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterVersionInfo {
    pub version: String,
    pub last_check_time: u64,
    pub last_update_time: u64,
}

pub type FilterStateMap = BTreeMap<FilterId, FilterStateInfo>;
pub type FilterVersionMap = BTreeMap<FilterId, FilterVersionInfo>;

/// One filter as read out of the pre-1.0.1.0 combined rules store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyFilterEntry {
    pub filter_id: FilterId,
    pub version: String,
    pub last_check_time: u64,
    pub last_update_time: u64,
    pub disabled: bool,
    pub rules: Vec<String>,
}

impl LegacyFilterEntry {
    /// Condensed metadata for the aggregate blob.
    pub fn info(&self) -> LegacyFilterInfo {
        LegacyFilterInfo {
            version: self.version.clone(),
            last_check_time: self.last_check_time,
            last_update_time: self.last_update_time,
            disabled: self.disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_blob_json_shape() {
        let json = r#"{"1":{"version":"1.0","lastCheckTime":10,"lastUpdateTime":20,"disabled":false}}"#;
        let map: LegacyFilterMap = serde_json::from_str(json).unwrap();
        let info = &map[&1];
        assert_eq!(info.version, "1.0");
        assert_eq!(info.last_check_time, 10);
        assert_eq!(info.last_update_time, 20);
        assert!(!info.disabled);

        let back = serde_json::to_string(&map).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn test_state_record_camel_case() {
        let state = FilterStateInfo {
            installed: true,
            enabled: true,
            loaded: true,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"installed":true,"enabled":true,"loaded":true}"#);
    }
}
