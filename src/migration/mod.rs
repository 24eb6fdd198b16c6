//! Versioned one-time migrations of persisted filter state

pub mod runner;
pub mod steps;

pub use runner::{execute_steps, run_update, StepFailure, UpdateConfig, UpdateOutcome};
pub use steps::registry;

use crate::models::RunInfo;
use crate::storage::{keys, FileStore, HitStats, KeyValueStore, RulesStore, StorageError};
use crate::utils::{is_greater_version, VersionError};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

/// Browser family reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    Chromium,
    Firefox,
    Edge,
    Safari,
}

impl FromStr for BrowserFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Self::Chromium),
            "firefox" => Ok(Self::Firefox),
            "edge" => Ok(Self::Edge),
            "safari" => Ok(Self::Safari),
            other => Err(format!("unknown browser family '{}'", other)),
        }
    }
}

/// Capability flags gating platform-specific migration steps. Derived from
/// the browser family once, instead of environment checks inside the runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Host historically stored settings in Firefox simple-storage prefs.
    pub firefox_prefs_migration: bool,
    /// Host historically stored rule files via the sandboxed filesystem API.
    pub chromium_file_storage: bool,
}

impl Capabilities {
    pub fn for_browser(family: BrowserFamily) -> Self {
        match family {
            BrowserFamily::Firefox => Self {
                firefox_prefs_migration: true,
                chromium_file_storage: false,
            },
            BrowserFamily::Chromium | BrowserFamily::Edge => Self {
                firefox_prefs_migration: false,
                chromium_file_storage: true,
            },
            BrowserFamily::Safari => Self::default(),
        }
    }
}

/// Everything a migration step may touch, constructed once at process start.
#[derive(Clone)]
pub struct UpdateContext {
    pub kv: Arc<dyn KeyValueStore>,
    pub rules: Arc<dyn RulesStore>,
    pub files: Arc<dyn FileStore>,
    pub hit_stats: Arc<dyn HitStats>,
    pub capabilities: Capabilities,
}

impl UpdateContext {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        rules: Arc<dyn RulesStore>,
        files: Arc<dyn FileStore>,
        hit_stats: Arc<dyn HitStats>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            kv,
            rules,
            files,
            hit_stats,
            capabilities,
        }
    }

    /// Build a context from one backend implementing every storage seam.
    pub fn with_backend<S>(backend: Arc<S>, capabilities: Capabilities) -> Self
    where
        S: KeyValueStore + RulesStore + FileStore + HitStats + 'static,
    {
        Self {
            kv: backend.clone(),
            rules: backend.clone(),
            files: backend.clone(),
            hit_stats: backend,
            capabilities,
        }
    }
}

/// A one-time transformation of persisted state, gated by a version
/// threshold. Registry order is ascending by threshold and significant:
/// later steps rely on earlier steps' storage mutations.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// Previous-version boundary below which this step must run.
    fn threshold(&self) -> &'static str;

    fn name(&self) -> &'static str;

    /// Whether the step applies on this platform at all.
    fn required(&self, capabilities: &Capabilities) -> bool {
        let _ = capabilities;
        true
    }

    async fn apply(&self, ctx: &UpdateContext) -> Result<(), StorageError>;
}

/// Compute run info for this process start, updating the persisted
/// version marker as a side effect.
pub async fn get_run_info(
    kv: &dyn KeyValueStore,
    current_version: &str,
) -> Result<RunInfo, StorageError> {
    // An empty marker means the version was never recorded.
    let prev_version = kv
        .get(keys::APP_VERSION)
        .await?
        .filter(|v| !v.trim().is_empty());
    kv.set(keys::APP_VERSION, current_version).await?;
    Ok(RunInfo::derive(current_version, prev_version))
}

/// The ordered subset of registered steps applicable to this update: a step
/// is selected iff its threshold is strictly greater than the previous
/// version, not past the version being installed, and its capability
/// requirement holds.
///
/// The upper bound keeps a step belonging to a later release from running
/// early and then running a second time on the update that introduces it.
pub fn select_steps<'a>(
    registry: &'a [Box<dyn MigrationStep>],
    run_info: &RunInfo,
    capabilities: &Capabilities,
) -> Result<Vec<&'a dyn MigrationStep>, VersionError> {
    if !run_info.is_update {
        return Ok(Vec::new());
    }
    let prev = match run_info.prev_version.as_deref() {
        Some(prev) => prev,
        None => return Ok(Vec::new()),
    };

    let mut selected = Vec::new();
    for step in registry {
        if is_greater_version(step.threshold(), prev)?
            && !is_greater_version(step.threshold(), &run_info.current_version)?
            && step.required(capabilities)
        {
            selected.push(step.as_ref());
        }
    }
    Ok(selected)
}
