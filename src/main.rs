//! Profile migration CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use webext_platform::storage::{keys, KeyValueStore, LocalStorage};
use webext_platform::{
    bootstrap, migration, BrowserFamily, Capabilities, UpdateConfig, UpdateContext,
};

#[derive(Parser)]
#[command(name = "webext-platform")]
#[command(about = "Migrate a content-filter profile directory to the current storage schema", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending storage migrations to a profile directory
    Migrate {
        /// Path to the profile directory
        #[arg(short, long)]
        profile: PathBuf,

        /// Browser family the profile belongs to (chromium, firefox, edge, safari)
        #[arg(short, long)]
        browser: String,

        /// Version to migrate the profile to
        #[arg(long)]
        current_version: String,

        /// Per-step timeout in seconds
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,

        /// Only print the steps that would run
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the persisted version marker and which records exist
    Status {
        /// Path to the profile directory
        #[arg(short, long)]
        profile: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate {
            profile,
            browser,
            current_version,
            timeout_secs,
            dry_run,
        } => {
            let family: BrowserFamily = browser.parse().map_err(anyhow::Error::msg)?;
            let backend = Arc::new(LocalStorage::open(&profile).await?);
            let ctx = UpdateContext::with_backend(backend, Capabilities::for_browser(family));

            if dry_run {
                return print_dry_run(&ctx, &current_version).await;
            }

            let config = UpdateConfig {
                step_timeout: Duration::from_secs(timeout_secs),
            };
            let (run_info, outcome) = bootstrap(&ctx, &current_version, &config).await?;

            println!("{}", "Profile migration".bold().blue());
            println!(
                "  - Previous version: {}",
                run_info.prev_version.as_deref().unwrap_or("none")
            );
            println!("  - Current version:  {}", run_info.current_version);

            if run_info.is_first_run {
                println!("{}", "First run: nothing to migrate".green());
            } else if outcome.applied.is_empty() && outcome.failures.is_empty() {
                println!("{}", "Storage schema already up to date".green());
            } else {
                for step in &outcome.applied {
                    println!("  {} {}", "applied".green(), step);
                }
                for failure in &outcome.failures {
                    let label = if failure.timed_out { "timeout" } else { "failed" };
                    println!("  {} {}: {}", label.red(), failure.step, failure.error);
                }
            }

            if outcome.is_clean() {
                println!("{}", "Migration completed".green().bold());
            } else {
                println!(
                    "{}",
                    format!(
                        "Migration completed with {} surfaced failure(s)",
                        outcome.failures.len()
                    )
                    .yellow()
                    .bold()
                );
            }
            Ok(())
        }

        Commands::Status { profile } => {
            let backend = LocalStorage::open(&profile).await?;
            println!("{}", "Profile status".bold().blue());
            println!(
                "  - Version marker: {}",
                backend
                    .get(keys::APP_VERSION)
                    .await?
                    .unwrap_or_else(|| "none".to_string())
            );
            for key in [
                keys::FILTERS_INFO,
                keys::FILTERS_STATE,
                keys::FILTERS_VERSION,
                keys::WHITE_LIST_DOMAINS,
                keys::IP_RESOLVER_CACHE,
            ] {
                let present = backend.has(key).await?;
                let marker = if present { "present".green() } else { "absent".dimmed() };
                println!("  - {}: {}", key, marker);
            }
            Ok(())
        }
    }
}

/// Print the steps an update would select, without touching the profile.
async fn print_dry_run(ctx: &UpdateContext, current_version: &str) -> Result<()> {
    let prev = ctx.kv.get(keys::APP_VERSION).await?;
    let run_info = webext_platform::RunInfo::derive(current_version, prev);
    let registry = migration::registry();
    let selected = migration::select_steps(&registry, &run_info, &ctx.capabilities)?;

    println!("{}", "Dry run".bold().blue());
    if selected.is_empty() {
        println!("  no steps selected");
    }
    for step in selected {
        println!("  {} (threshold {})", step.name(), step.threshold());
    }
    Ok(())
}
