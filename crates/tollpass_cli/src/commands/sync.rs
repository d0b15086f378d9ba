//! Sync commands: push, push-unlinked, sync and the periodic scheduler.

use super::{CliError, CliResult, Context, Engine};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tollpass_sync::{CycleReport, PushOutcome, PushReport};
use tracing::{info, warn};

/// Runs the push command.
pub fn push(ctx: &Context, plate: &str) -> CliResult<()> {
    let pass = ctx.ledger.get(plate)?;
    match ctx.engine.push_one(&pass)? {
        PushOutcome::Suppressed => println!("{plate}: authored remotely, nothing to push"),
        PushOutcome::Unchanged => println!("{plate}: already up to date"),
        PushOutcome::Created(remote_ref) => println!("{plate}: created remote #{remote_ref}"),
        PushOutcome::Written(remote_ref) => println!("{plate}: updated remote #{remote_ref}"),
    }
    Ok(())
}

/// Runs the push-unlinked command.
pub fn push_unlinked(ctx: &Context) -> CliResult<()> {
    let report = ctx.engine.push_unlinked()?;
    print!("{}", summarize_push(&report));
    Ok(())
}

/// Runs one sync cycle.
pub fn run_once(ctx: &Context) -> CliResult<()> {
    let report = ctx.engine.cron_sync()?;
    print!("{}", summarize_cycle(&report));
    Ok(())
}

/// Runs sync cycles every `interval` seconds until ctrl-c.
///
/// Cycles block on the remote, so each one runs on the blocking pool; the
/// engine itself refuses overlapping cycles.
pub fn watch(ctx: &Context, interval: u64) -> CliResult<()> {
    if interval == 0 {
        return Err(CliError::ZeroInterval.into());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch_loop(
        Arc::clone(&ctx.engine),
        Duration::from_secs(interval),
    ))
}

async fn watch_loop(engine: Arc<Engine>, every: Duration) -> CliResult<()> {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(interval_secs = every.as_secs(), "sync scheduler started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let engine = Arc::clone(&engine);
                match tokio::task::spawn_blocking(move || engine.cron_sync()).await? {
                    Ok(report) if !report.is_clean() => {
                        warn!(
                            failures = report.failure_count(),
                            "sync cycle finished with failures"
                        );
                    }
                    Ok(_) => {}
                    Err(error) => {
                        warn!(%error, retryable = error.is_retryable(), "scheduled sync failed");
                    }
                }
            }
            result = &mut shutdown => {
                result?;
                info!("sync scheduler stopped");
                return Ok(());
            }
        }
    }
}

fn summarize_push(report: &PushReport) -> String {
    let mut out = format!(
        "pushed {} of {} ({} skipped, {} failed)\n",
        report.pushed,
        report.attempted,
        report.skipped,
        report.failures.len()
    );
    for failure in &report.failures {
        out.push_str(&format!("  {}: {}\n", failure.plate, failure.error));
    }
    out
}

fn summarize_cycle(report: &CycleReport) -> String {
    let mut out = summarize_push(&report.push);
    out.push_str(&format!(
        "pulled {} rows: {} created, {} updated, {} deferred, {} failed\n",
        report.pull.fetched,
        report.pull.created,
        report.pull.updated,
        report.pull.deferred,
        report.pull.failures.len()
    ));
    for failure in &report.pull.failures {
        out.push_str(&format!("  {}: {}\n", failure.plate, failure.error));
    }
    out
}
