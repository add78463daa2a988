//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the run loop that coordinates one crawl of a board:
//! - Creating and finalizing the run record
//! - Snapshotting the trigger rules for the run
//! - Downloading the catalog
//! - Keeping a fixed-width pool of thread workers busy until the catalog is exhausted
//! - Merging worker statistics and logging the run report

use crate::api::{Catalog, Endpoints};
use crate::config::{BoardEntry, Config};
use crate::crawler::fetcher::{build_http_client, ApiClient};
use crate::crawler::gate::RateGate;
use crate::crawler::with_storage;
use crate::crawler::worker::{ThreadWorker, WorkerContext, WorkerStatus};
use crate::output::RunStats;
use crate::storage::{BoardRecord, RunRecord, RunStatus, RunUpdate, SqliteStorage, Storage};
use crate::triggers::TriggerEngine;
use crate::{ArchiverError, Result};
use reqwest::Client;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    client: Client,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Opens the database and media directory and records the configured
    /// boards.
    ///
    /// # Arguments
    ///
    /// * `config` - The archiver configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(ArchiverError)` - Failed to initialize
    pub fn new(config: Config) -> Result<Self> {
        let mut storage = SqliteStorage::new(
            Path::new(&config.output.database_path),
            Path::new(&config.output.media_path),
        )?;

        for board in &config.boards {
            storage.upsert_board(&BoardRecord::from(board))?;
        }

        let timeout = Duration::from_secs(config.scraper.connection_timeout);
        let client = build_http_client(&config.user_agent, timeout)?;

        tracing::debug!(
            "Media files are written below {}",
            storage.media().root().display()
        );

        Ok(Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            client,
        })
    }

    /// Shared handle to the underlying store
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.storage)
    }

    /// Crawls every active board once, one after another
    ///
    /// A board whose catalog cannot be downloaded is logged and skipped; its
    /// run record stays marked as failed.
    pub async fn run(&self) -> Result<Vec<RunRecord>> {
        let workers = self.config.scraper.workers as usize;
        let mut runs = Vec::new();

        for board in self.config.boards.iter().filter(|b| b.active) {
            match self.run_board(&board.name, workers).await {
                Ok(run) => runs.push(run),
                Err(e @ ArchiverError::Catalog { .. }) => {
                    tracing::error!("Skipping /{}/: {}", board.name, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(runs)
    }

    /// Crawls one board with a pool of `workers` thread workers
    ///
    /// # Returns
    ///
    /// * `Ok(RunRecord)` - The completed run
    /// * `Err(ArchiverError::Catalog)` - The catalog could not be fetched; the run is marked failed
    pub async fn run_board(&self, board: &str, workers: usize) -> Result<RunRecord> {
        let entry = self
            .config
            .board(board)
            .ok_or_else(|| ArchiverError::BoardNotFound(board.to_string()))?;
        let workers = workers.max(1);
        let started = Instant::now();

        let run_id = with_storage(&self.storage, |storage| {
            Ok(storage.create_run(board, workers as u32)?)
        })?;
        let triggers = with_storage(&self.storage, |storage| {
            Ok(TriggerEngine::load(&*storage)?)
        })?;

        tracing::info!(
            "Run {}: updating /{}/ with {} workers and {} trigger rules",
            run_id,
            board,
            workers,
            triggers.rule_count()
        );

        let api = Arc::new(ApiClient::new(
            self.client.clone(),
            Endpoints::new(&self.config.api),
            RateGate::from_config(&self.config.scraper),
        ));
        let stats = RunStats::new();

        let catalog = match api.get_catalog(board, &stats).await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!("Run {}: unable to download the catalog: {}", run_id, e);
                let update = RunUpdate::new(
                    RunStatus::Failed,
                    stats.totals(),
                    started.elapsed(),
                    workers,
                );
                with_storage(&self.storage, |storage| {
                    Ok(storage.finish_run(run_id, &update)?)
                })?;
                return Err(ArchiverError::Catalog {
                    board: board.to_string(),
                    source: Box::new(e),
                });
            }
        };

        tracing::info!("Run {}: {} threads in catalog", run_id, catalog.remaining());

        let ctx = Arc::new(WorkerContext {
            board: board.to_string(),
            replies_threshold: entry.replies_threshold,
            api,
            storage: Arc::clone(&self.storage),
            triggers: Arc::new(triggers),
        });

        self.drain_catalog(&ctx, entry, catalog, workers, &stats)
            .await;

        let elapsed = started.elapsed();
        let update = RunUpdate::new(RunStatus::Completed, stats.totals(), elapsed, workers);
        let run = with_storage(&self.storage, |storage| {
            storage.finish_run(run_id, &update)?;
            Ok(storage.get_run(run_id)?)
        })?;

        tracing::info!("Run {}: {}", run_id, stats.report(elapsed, workers));
        Ok(run)
    }

    /// Keeps `workers` workers running until every eligible thread was handled
    async fn drain_catalog(
        &self,
        ctx: &Arc<WorkerContext>,
        board: &BoardEntry,
        catalog: Catalog,
        workers: usize,
        stats: &RunStats,
    ) {
        let threshold = board.replies_threshold;
        let mut queue = catalog.filter(|thread| thread.replies >= threshold);
        let mut pool = JoinSet::new();

        for thread in queue.by_ref().take(workers) {
            pool.spawn(ThreadWorker::new(Arc::clone(ctx), thread).run());
        }

        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(outcome) => {
                    stats.merge(&outcome.stats);
                    if !matches!(outcome.status, WorkerStatus::Failed(_)) {
                        tracing::trace!(
                            "/{}/ thread {} done: {:?}",
                            board.name,
                            outcome.thread,
                            outcome.status
                        );
                    }
                }
                Err(e) => tracing::error!("Worker task for /{}/ died: {}", board.name, e),
            }

            if let Some(thread) = queue.next() {
                pool.spawn(ThreadWorker::new(Arc::clone(ctx), thread).run());
            }
        }
    }
}
