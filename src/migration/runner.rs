//! Sequential update runner with a surfaced, non-fatal failure list

use super::{select_steps, steps, UpdateContext};
use crate::models::RunInfo;
use crate::utils::VersionError;
use log::{error, info};
use std::time::Duration;

/// Runner tuning. The step timeout bounds a stuck step so a wedged storage
/// backend cannot stall startup indefinitely.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub step_timeout: Duration,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(60),
        }
    }
}

/// A step that failed or timed out. Failures never abort the run; they are
/// reported here instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: &'static str,
    pub error: String,
    pub timed_out: bool,
}

/// Resolved exactly once, after every selected step has settled.
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    /// Names of steps that completed, in execution order.
    pub applied: Vec<&'static str>,
    pub failures: Vec<StepFailure>,
}

impl UpdateOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run every applicable migration step strictly sequentially: no step
/// starts before the previous one has settled, because later steps assume
/// earlier storage mutations are committed.
pub async fn run_update(
    ctx: &UpdateContext,
    run_info: &RunInfo,
    config: &UpdateConfig,
) -> Result<UpdateOutcome, VersionError> {
    let registry = steps::registry();
    let selected = select_steps(&registry, run_info, &ctx.capabilities)?;

    if selected.is_empty() {
        return Ok(UpdateOutcome::default());
    }

    info!(
        "updating storage schema {} -> {}: {} step(s) selected",
        run_info.prev_version.as_deref().unwrap_or("none"),
        run_info.current_version,
        selected.len()
    );

    Ok(execute_steps(ctx, &selected, config).await)
}

/// Execute steps in the given order, collecting failures. Exposed so tests
/// can drive hand-built step lists through the same machinery.
pub async fn execute_steps(
    ctx: &UpdateContext,
    steps: &[&dyn super::MigrationStep],
    config: &UpdateConfig,
) -> UpdateOutcome {
    let mut outcome = UpdateOutcome::default();

    for &step in steps {
        info!(
            "running migration step '{}' (threshold {})",
            step.name(),
            step.threshold()
        );
        match tokio::time::timeout(config.step_timeout, step.apply(ctx)).await {
            Ok(Ok(())) => outcome.applied.push(step.name()),
            Ok(Err(e)) => {
                error!("migration step '{}' failed: {}", step.name(), e);
                outcome.failures.push(StepFailure {
                    step: step.name(),
                    error: e.to_string(),
                    timed_out: false,
                });
            }
            Err(_) => {
                error!(
                    "migration step '{}' timed out after {:?}",
                    step.name(),
                    config.step_timeout
                );
                outcome.failures.push(StepFailure {
                    step: step.name(),
                    error: format!("timed out after {:?}", config.step_timeout),
                    timed_out: true,
                });
            }
        }
    }

    outcome
}
