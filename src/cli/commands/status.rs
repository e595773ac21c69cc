//! `stats` and `health` commands.

use anyhow::{bail, Context, Result};
use console::style;

use crate::cli::output::{create_spinner, ProgressBarExt, TableFormatter};
use crate::infrastructure::vector::HealthStatus;
use crate::services::RagSystem;

/// Handle stats command
pub async fn handle_stats(system: &RagSystem, json: bool) -> Result<()> {
    let spinner = create_spinner("Collecting statistics", json);
    let stats = system.get_stats().await.context("Failed to collect statistics")?;
    spinner.finish_silently();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", TableFormatter::new().format_stats(&stats));
        if let Some(failover) = &stats.store.failover {
            println!(
                "\n{} Running on {} since {} ({} failed: {})",
                style("!").yellow(),
                stats.store.fallback,
                failover.failed_over_at.format("%Y-%m-%d %H:%M:%S UTC"),
                failover.operation,
                failover.reason
            );
        }
    }

    Ok(())
}

/// Handle health command. Exits non-zero when a backend reports an error.
pub async fn handle_health(system: &RagSystem, json: bool) -> Result<()> {
    let health = system.health_check().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&health)?);
    } else {
        println!("{}", TableFormatter::new().format_health(&health));
    }

    if health.status == HealthStatus::Error {
        bail!("System is unhealthy");
    }
    Ok(())
}
