//! Crawler module for thread archiving
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching of the catalog, threads and media
//! - Request spacing per request class
//! - Per-thread diffing against the store
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod gate;
mod worker;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, ApiClient};
pub use gate::{RateGate, RequestClass};
pub use worker::{
    needs_update, plan_removals, ThreadWorker, WorkerContext, WorkerOutcome, WorkerStatus,
};

use crate::config::Config;
use crate::storage::{RunRecord, SqliteStorage};
use crate::{ArchiverError, Result};
use std::sync::Mutex;

/// Runs a complete crawl of one board
///
/// This is the main entry point for a single crawl. It will:
/// 1. Open the store and register the configured boards
/// 2. Create a run record and snapshot the trigger rules
/// 3. Download the catalog
/// 4. Update every thread above the board's reply threshold
/// 5. Finalize the run record and log the report
///
/// # Arguments
///
/// * `config` - The archiver configuration
/// * `board` - Name of a configured board
/// * `workers` - Number of threads updated concurrently
///
/// # Returns
///
/// * `Ok(RunRecord)` - Crawl completed
/// * `Err(ArchiverError)` - Crawl failed
pub async fn run_crawl(config: Config, board: &str, workers: usize) -> Result<RunRecord> {
    let coordinator = Coordinator::new(config)?;
    coordinator.run_board(board, workers).await
}

/// Runs `f` with the store locked
///
/// The lock is released before this returns, so callers in async code never
/// hold it across an `.await`.
pub(crate) fn with_storage<T>(
    storage: &Mutex<SqliteStorage>,
    f: impl FnOnce(&mut SqliteStorage) -> Result<T>,
) -> Result<T> {
    let mut guard = storage
        .lock()
        .map_err(|e| ArchiverError::StorageLock(e.to_string()))?;
    f(&mut guard)
}
