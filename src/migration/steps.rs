//! The compiled-in migration step registry

use super::{Capabilities, MigrationStep, UpdateContext};
use crate::models::{
    FilterStateInfo, FilterStateMap, FilterVersionInfo, FilterVersionMap, LegacyFilterMap,
    SEARCH_AND_SELF_PROMO_FILTER_ID, USER_FILTER_ID, WHITE_LIST_FILTER_ID,
};
use crate::storage::{keys, legacy_rules_file, KeyValueStore, StorageError, COMBINED_RULES_FILE};
use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, error, info};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// All known migration steps, ascending by threshold. Order matters: later
/// steps read records written by earlier ones.
pub fn registry() -> Vec<Box<dyn MigrationStep>> {
    vec![
        Box::new(SplitCombinedRulesStore),
        Box::new(SplitAggregateMetadata),
        Box::new(DropIpResolverCache),
        Box::new(ExtractWhitelistDomains),
        Box::new(CleanupHitStats),
        Box::new(FirefoxPrefsPlaceholder),
        Box::new(TransferUserRulesFromFile),
    ]
}

async fn read_json_map<T>(kv: &dyn KeyValueStore, key: &str) -> Result<T, StorageError>
where
    T: DeserializeOwned + Default,
{
    match kv.get(key).await? {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| StorageError::MalformedRecord {
            key: key.to_string(),
            source: e,
        }),
        None => Ok(T::default()),
    }
}

async fn write_json<T: Serialize>(
    kv: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    kv.set(key, &serde_json::to_string(value)?).await
}

/// 1.0.1.0: rules used to live in one combined store. Re-write each filter's
/// rules to its own record and condense the metadata into the aggregate
/// blob consumed by the next schema change.
struct SplitCombinedRulesStore;

#[async_trait]
impl MigrationStep for SplitCombinedRulesStore {
    fn threshold(&self) -> &'static str {
        "1.0.1.0"
    }

    fn name(&self) -> &'static str {
        "split-combined-rules-store"
    }

    async fn apply(&self, ctx: &UpdateContext) -> Result<(), StorageError> {
        let entries = ctx.rules.read_legacy_dump().await?;

        let mut info = LegacyFilterMap::new();
        for entry in &entries {
            ctx.rules.write(entry.filter_id, &entry.rules).await?;
            info.insert(entry.filter_id, entry.info());
        }
        write_json(ctx.kv.as_ref(), keys::FILTERS_INFO, &info).await?;

        // Old combined file may already be gone; that is fine.
        if let Err(e) = ctx.files.remove(COMBINED_RULES_FILE).await {
            debug!("combined rules file not removed: {}", e);
        }
        Ok(())
    }
}

/// 1.0.3.0: split the aggregate blob into per-filter install/enable flags
/// and per-filter version info, then drop the blob.
struct SplitAggregateMetadata;

#[async_trait]
impl MigrationStep for SplitAggregateMetadata {
    fn threshold(&self) -> &'static str {
        "1.0.3.0"
    }

    fn name(&self) -> &'static str {
        "split-aggregate-metadata"
    }

    async fn apply(&self, ctx: &UpdateContext) -> Result<(), StorageError> {
        let kv = ctx.kv.as_ref();
        if !kv.has(keys::FILTERS_INFO).await? {
            return Ok(());
        }
        let blob: LegacyFilterMap = read_json_map(kv, keys::FILTERS_INFO).await?;

        let mut states: FilterStateMap = read_json_map(kv, keys::FILTERS_STATE).await?;
        for (&filter_id, filter_info) in &blob {
            // User rules and the whitelist are pseudo-filters, not
            // installable subscriptions.
            if filter_id == USER_FILTER_ID || filter_id == WHITE_LIST_FILTER_ID {
                continue;
            }
            let mut state = FilterStateInfo {
                loaded: true,
                ..FilterStateInfo::default()
            };
            if !filter_info.disabled {
                state.installed = true;
                state.enabled = true;
            }
            if filter_id == SEARCH_AND_SELF_PROMO_FILTER_ID {
                state.installed = true;
            }
            states.insert(filter_id, state);
        }
        write_json(kv, keys::FILTERS_STATE, &states).await?;

        let mut versions: FilterVersionMap = read_json_map(kv, keys::FILTERS_VERSION).await?;
        for (&filter_id, filter_info) in &blob {
            versions.insert(
                filter_id,
                FilterVersionInfo {
                    version: filter_info.version.clone(),
                    last_check_time: filter_info.last_check_time,
                    last_update_time: filter_info.last_update_time,
                },
            );
        }
        write_json(kv, keys::FILTERS_VERSION, &versions).await?;

        kv.remove(keys::FILTERS_INFO).await
    }
}

/// 2.0.0: the ip-resolver went away with its cache record.
struct DropIpResolverCache;

#[async_trait]
impl MigrationStep for DropIpResolverCache {
    fn threshold(&self) -> &'static str {
        "2.0.0"
    }

    fn name(&self) -> &'static str {
        "drop-ip-resolver-cache"
    }

    async fn apply(&self, ctx: &UpdateContext) -> Result<(), StorageError> {
        ctx.kv.remove(keys::IP_RESOLVER_CACHE).await
    }
}

lazy_static! {
    static ref WHITELIST_RULE: Regex = Regex::new(r"^@@//([^/]+)\^\$document$").unwrap();
}

/// 2.0.9: whitelisted domains move from document-exception rules in the
/// whitelist filter to a dedicated JSON list.
struct ExtractWhitelistDomains;

#[async_trait]
impl MigrationStep for ExtractWhitelistDomains {
    fn threshold(&self) -> &'static str {
        "2.0.9"
    }

    fn name(&self) -> &'static str {
        "extract-whitelist-domains"
    }

    async fn apply(&self, ctx: &UpdateContext) -> Result<(), StorageError> {
        let lines = match ctx.rules.read(WHITE_LIST_FILTER_ID).await? {
            Some(lines) => lines,
            None => return Ok(()),
        };

        let mut domains: Vec<String> = Vec::new();
        for line in &lines {
            if let Some(caps) = WHITELIST_RULE.captures(line) {
                let domain = caps[1].to_string();
                if !domains.contains(&domain) {
                    domains.push(domain);
                }
            }
        }

        write_json(ctx.kv.as_ref(), keys::WHITE_LIST_DOMAINS, &domains).await
    }
}

/// 2.0.10: hit counters recorded under the old schema are stale.
struct CleanupHitStats;

#[async_trait]
impl MigrationStep for CleanupHitStats {
    fn threshold(&self) -> &'static str {
        "2.0.10"
    }

    fn name(&self) -> &'static str {
        "cleanup-hit-stats"
    }

    async fn apply(&self, ctx: &UpdateContext) -> Result<(), StorageError> {
        ctx.hit_stats.cleanup().await
    }
}

/// 2.1.2: the Firefox simple-storage transfer was disabled before release
/// and the threshold must stay occupied so selection order is stable.
struct FirefoxPrefsPlaceholder;

#[async_trait]
impl MigrationStep for FirefoxPrefsPlaceholder {
    fn threshold(&self) -> &'static str {
        "2.1.2"
    }

    fn name(&self) -> &'static str {
        "firefox-prefs-placeholder"
    }

    fn required(&self, capabilities: &Capabilities) -> bool {
        capabilities.firefox_prefs_migration
    }

    async fn apply(&self, _ctx: &UpdateContext) -> Result<(), StorageError> {
        info!("firefox prefs migration is intentionally a no-op");
        Ok(())
    }
}

/// 2.3.5: chromium builds kept user rules in a sandboxed file; move them
/// into the rule store and drop the file.
struct TransferUserRulesFromFile;

#[async_trait]
impl MigrationStep for TransferUserRulesFromFile {
    fn threshold(&self) -> &'static str {
        "2.3.5"
    }

    fn name(&self) -> &'static str {
        "transfer-user-rules-from-file"
    }

    fn required(&self, capabilities: &Capabilities) -> bool {
        capabilities.chromium_file_storage
    }

    async fn apply(&self, ctx: &UpdateContext) -> Result<(), StorageError> {
        let path = legacy_rules_file(USER_FILTER_ID);

        let rules = match ctx.files.read_lines(&path).await {
            Ok(rules) => rules,
            Err(e) => {
                // Transfer is skipped, startup is not: surface the failure
                // through the runner and leave the store untouched.
                error!("error reading rules from file {}: {}", path, e);
                return Err(e);
            }
        };

        info!("found {} rules in {}", rules.len(), path);
        ctx.rules.write(USER_FILTER_ID, &rules).await?;
        info!(
            "rules have been transferred to the rule store for filter {}",
            USER_FILTER_ID
        );

        match ctx.files.remove(&path).await {
            Ok(()) => info!("file removed for filter {}", USER_FILTER_ID),
            Err(e) => error!("file remove error for filter {}: {}", USER_FILTER_ID, e),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::BrowserFamily;
    use crate::models::{LegacyFilterEntry, LegacyFilterInfo, RunInfo};
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn ctx(backend: Arc<MemoryStorage>, family: BrowserFamily) -> UpdateContext {
        UpdateContext::with_backend(backend, Capabilities::for_browser(family))
    }

    #[test]
    fn test_registry_is_ascending_by_threshold() {
        let registry = registry();
        let thresholds: Vec<crate::utils::Version> = registry
            .iter()
            .map(|s| s.threshold().parse().unwrap())
            .collect();
        let mut sorted = thresholds.clone();
        sorted.sort();
        assert_eq!(thresholds, sorted);
    }

    #[test]
    fn test_selection_honors_capability_gates() {
        let registry = registry();
        let run_info = RunInfo::derive("2.3.5", Some("1.0.0.0".to_string()));

        let firefox = crate::migration::select_steps(
            &registry,
            &run_info,
            &Capabilities::for_browser(BrowserFamily::Firefox),
        )
        .unwrap();
        let names: Vec<_> = firefox.iter().map(|s| s.name()).collect();
        assert!(names.contains(&"firefox-prefs-placeholder"));
        assert!(!names.contains(&"transfer-user-rules-from-file"));

        let safari = crate::migration::select_steps(
            &registry,
            &run_info,
            &Capabilities::for_browser(BrowserFamily::Safari),
        )
        .unwrap();
        let names: Vec<_> = safari.iter().map(|s| s.name()).collect();
        assert!(!names.contains(&"firefox-prefs-placeholder"));
        assert!(!names.contains(&"transfer-user-rules-from-file"));
    }

    #[tokio::test]
    async fn test_split_combined_rules_store() {
        let backend = Arc::new(MemoryStorage::new());
        backend
            .seed_legacy_dump(vec![
                LegacyFilterEntry {
                    filter_id: 1,
                    version: "1.0".to_string(),
                    last_check_time: 10,
                    last_update_time: 20,
                    disabled: false,
                    rules: vec!["||ads.example.com^".to_string()],
                },
                LegacyFilterEntry {
                    filter_id: 2,
                    version: "3.1".to_string(),
                    last_check_time: 30,
                    last_update_time: 40,
                    disabled: true,
                    rules: vec![],
                },
            ])
            .await;
        backend.seed_file(COMBINED_RULES_FILE, "stale").await;

        let ctx = ctx(backend.clone(), BrowserFamily::Chromium);
        SplitCombinedRulesStore.apply(&ctx).await.unwrap();

        assert_eq!(
            ctx.rules.read(1).await.unwrap(),
            Some(vec!["||ads.example.com^".to_string()])
        );
        let blob: LegacyFilterMap =
            serde_json::from_str(&ctx.kv.get(keys::FILTERS_INFO).await.unwrap().unwrap()).unwrap();
        assert_eq!(
            blob[&1],
            LegacyFilterInfo {
                version: "1.0".to_string(),
                last_check_time: 10,
                last_update_time: 20,
                disabled: false,
            }
        );
        assert!(blob[&2].disabled);
        assert!(!backend.file_exists(COMBINED_RULES_FILE).await);
    }

    #[tokio::test]
    async fn test_split_aggregate_metadata() {
        let backend = Arc::new(MemoryStorage::new());
        let ctx = ctx(backend, BrowserFamily::Chromium);
        ctx.kv
            .set(
                keys::FILTERS_INFO,
                r#"{"1":{"version":"1.0","lastCheckTime":10,"lastUpdateTime":20,"disabled":false}}"#,
            )
            .await
            .unwrap();

        SplitAggregateMetadata.apply(&ctx).await.unwrap();

        let states: FilterStateMap =
            serde_json::from_str(&ctx.kv.get(keys::FILTERS_STATE).await.unwrap().unwrap()).unwrap();
        assert_eq!(
            states[&1],
            FilterStateInfo {
                installed: true,
                enabled: true,
                loaded: true,
            }
        );

        let versions: FilterVersionMap =
            serde_json::from_str(&ctx.kv.get(keys::FILTERS_VERSION).await.unwrap().unwrap())
                .unwrap();
        assert_eq!(versions[&1].version, "1.0");
        assert_eq!(versions[&1].last_check_time, 10);
        assert_eq!(versions[&1].last_update_time, 20);

        assert!(!ctx.kv.has(keys::FILTERS_INFO).await.unwrap());
    }

    #[tokio::test]
    async fn test_split_aggregate_metadata_skips_pseudo_filters() {
        let backend = Arc::new(MemoryStorage::new());
        let ctx = ctx(backend, BrowserFamily::Chromium);
        let blob = format!(
            r#"{{"{}":{{"version":"1","lastCheckTime":1,"lastUpdateTime":1,"disabled":false}},
                "{}":{{"version":"2","lastCheckTime":2,"lastUpdateTime":2,"disabled":true}},
                "{}":{{"version":"3","lastCheckTime":3,"lastUpdateTime":3,"disabled":true}}}}"#,
            USER_FILTER_ID, WHITE_LIST_FILTER_ID, SEARCH_AND_SELF_PROMO_FILTER_ID
        );
        ctx.kv.set(keys::FILTERS_INFO, &blob).await.unwrap();

        SplitAggregateMetadata.apply(&ctx).await.unwrap();

        let states: FilterStateMap =
            serde_json::from_str(&ctx.kv.get(keys::FILTERS_STATE).await.unwrap().unwrap()).unwrap();
        assert!(!states.contains_key(&USER_FILTER_ID));
        assert!(!states.contains_key(&WHITE_LIST_FILTER_ID));
        // Disabled, but the self-promo filter is always marked installed.
        let promo = &states[&SEARCH_AND_SELF_PROMO_FILTER_ID];
        assert!(promo.installed);
        assert!(!promo.enabled);
        assert!(promo.loaded);

        let versions: FilterVersionMap =
            serde_json::from_str(&ctx.kv.get(keys::FILTERS_VERSION).await.unwrap().unwrap())
                .unwrap();
        assert_eq!(versions.len(), 3);
    }

    #[tokio::test]
    async fn test_split_aggregate_metadata_without_blob_is_noop() {
        let backend = Arc::new(MemoryStorage::new());
        let ctx = ctx(backend, BrowserFamily::Chromium);
        SplitAggregateMetadata.apply(&ctx).await.unwrap();
        assert!(!ctx.kv.has(keys::FILTERS_STATE).await.unwrap());
    }

    #[tokio::test]
    async fn test_extract_whitelist_domains_dedupes() {
        let backend = Arc::new(MemoryStorage::new());
        let ctx = ctx(backend, BrowserFamily::Chromium);
        ctx.rules
            .write(
                WHITE_LIST_FILTER_ID,
                &[
                    "@@//example.com^$document".to_string(),
                    "@@//example.com^$document".to_string(),
                    "other-rule".to_string(),
                    "@@//sub.example.org^$document".to_string(),
                ],
            )
            .await
            .unwrap();

        ExtractWhitelistDomains.apply(&ctx).await.unwrap();

        assert_eq!(
            ctx.kv.get(keys::WHITE_LIST_DOMAINS).await.unwrap().unwrap(),
            r#"["example.com","sub.example.org"]"#
        );
    }

    #[tokio::test]
    async fn test_extract_whitelist_domains_without_rules_is_noop() {
        let backend = Arc::new(MemoryStorage::new());
        let ctx = ctx(backend, BrowserFamily::Chromium);
        ExtractWhitelistDomains.apply(&ctx).await.unwrap();
        assert!(!ctx.kv.has(keys::WHITE_LIST_DOMAINS).await.unwrap());
    }

    #[tokio::test]
    async fn test_transfer_user_rules_from_file() {
        let backend = Arc::new(MemoryStorage::new());
        backend
            .seed_file(
                &legacy_rules_file(USER_FILTER_ID),
                "||custom.example^\n##.my-ad\n",
            )
            .await;
        let ctx = ctx(backend.clone(), BrowserFamily::Chromium);

        TransferUserRulesFromFile.apply(&ctx).await.unwrap();

        assert_eq!(
            ctx.rules.read(USER_FILTER_ID).await.unwrap(),
            Some(vec!["||custom.example^".to_string(), "##.my-ad".to_string()])
        );
        assert!(!backend.file_exists(&legacy_rules_file(USER_FILTER_ID)).await);
    }

    #[tokio::test]
    async fn test_transfer_user_rules_missing_file_fails_without_write() {
        let backend = Arc::new(MemoryStorage::new());
        let ctx = ctx(backend, BrowserFamily::Chromium);

        let err = TransferUserRulesFromFile.apply(&ctx).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert_eq!(ctx.rules.read(USER_FILTER_ID).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cleanup_hit_stats_invokes_collaborator() {
        let backend = Arc::new(MemoryStorage::new());
        let ctx = ctx(backend.clone(), BrowserFamily::Chromium);
        CleanupHitStats.apply(&ctx).await.unwrap();
        assert_eq!(backend.cleanup_count(), 1);
    }
}
