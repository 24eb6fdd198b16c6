//! Platform layer for a content-filtering browser extension
//!
//! Three concerns live here: a versioned migration engine for persisted
//! filter state, normalization of host webRequest/webNavigation payloads
//! into one request-context shape, and a declarative context-menu model.
//! Host APIs and the rule-matching engine stay behind trait seams.

pub mod adapter;
pub mod menus;
pub mod migration;
pub mod models;
pub mod storage;
pub mod utils;

pub use migration::{
    registry, run_update, BrowserFamily, Capabilities, MigrationStep, StepFailure, UpdateConfig,
    UpdateContext, UpdateOutcome,
};
pub use models::RunInfo;
pub use storage::{LocalStorage, MemoryStorage, StorageError};
pub use utils::{is_greater_version, Version, VersionError};

use anyhow::Result;

/// Main entry point for process start: derive run info and bring persisted
/// state up to the current schema.
///
/// Consumers must await this before reading any migrated record; the
/// returned outcome is the runner's single completion signal.
pub async fn bootstrap(
    ctx: &UpdateContext,
    current_version: &str,
    config: &UpdateConfig,
) -> Result<(RunInfo, UpdateOutcome)> {
    // 1. Compute run info, moving the persisted version marker forward
    let run_info = migration::get_run_info(ctx.kv.as_ref(), current_version).await?;

    // 2. Apply pending migration steps (no-op on first run or same version)
    let outcome = run_update(ctx, &run_info, config).await?;

    Ok((run_info, outcome))
}
