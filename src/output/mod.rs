//! Output module for run statistics and reports
//!
//! This module handles:
//! - Collecting per-run counters and timers (`RunStats`)
//! - Rendering the one-line run summary logged after each crawl
//! - Printing the history of previous runs stored in the database

pub mod stats;

pub use stats::{per_worker_seconds, Counter, RunStats, RunTotals, Timer};

use crate::storage::{RunRecord, Storage};
use crate::ArchiverError;

/// Loads the most recent runs from storage, newest first
pub fn load_run_history(
    storage: &dyn Storage,
    limit: usize,
) -> Result<Vec<RunRecord>, ArchiverError> {
    Ok(storage.recent_runs(limit)?)
}

/// Formats one run as a table row
pub fn format_run(run: &RunRecord) -> String {
    format!(
        "#{:<5} /{:<6} {:<10} {:<25} {:>8.1}s {:>3} workers  +{:<5} -{:<5} threads {:<5} images {:<5}",
        run.id,
        format!("{}/", run.board),
        run.status.to_db_string(),
        run.started_at,
        run.total_time,
        run.used_workers,
        run.added_posts,
        run.removed_posts,
        run.processed_threads,
        run.downloaded_images,
    )
}

/// Prints run history to stdout in a formatted manner
pub fn print_run_history(runs: &[RunRecord]) {
    println!("=== Run History ===\n");

    if runs.is_empty() {
        println!("No runs recorded yet.");
        return;
    }

    for run in runs {
        println!("{}", format_run(run));
    }

    let added: u64 = runs.iter().map(|r| r.added_posts).sum();
    let removed: u64 = runs.iter().map(|r| r.removed_posts).sum();
    let failed = runs
        .iter()
        .filter(|r| r.status == crate::storage::RunStatus::Failed)
        .count();

    println!();
    println!(
        "{} runs shown: {} posts added, {} removed, {} failed runs",
        runs.len(),
        added,
        removed,
        failed
    );
}
