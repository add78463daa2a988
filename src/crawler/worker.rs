//! Per-thread update logic
//!
//! A `ThreadWorker` brings one stored thread in line with its remote copy:
//! it decides whether the thread changed since the last run, downloads the
//! post list, stores posts newer than the newest stored one (with their
//! attachments) and deletes stored posts that vanished remotely.

use crate::api::{Attachment, CatalogEntry, MessageData};
use crate::crawler::fetcher::ApiClient;
use crate::crawler::with_storage;
use crate::output::{Counter, RunStats};
use crate::storage::{DownloadedMedia, SqliteStorage, Storage, ThreadSnapshot};
use crate::triggers::TriggerEngine;
use crate::{ArchiverError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// State shared by every worker of a run
pub struct WorkerContext {
    pub board: String,
    pub replies_threshold: u32,
    pub api: Arc<ApiClient>,
    pub storage: Arc<Mutex<SqliteStorage>>,
    pub triggers: Arc<TriggerEngine>,
}

/// How a worker left its thread
#[derive(Debug)]
pub enum WorkerStatus {
    /// Fewer catalog replies than the board threshold
    BelowThreshold,
    /// Stored copy already matches the catalog
    UpToDate,
    Updated { added: u64, removed: u64 },
    /// Processing stopped early; mutations made before the error stand
    Failed(ArchiverError),
}

/// Result of one worker, handed back to the coordinator
#[derive(Debug)]
pub struct WorkerOutcome {
    pub thread: i64,
    pub stats: RunStats,
    pub status: WorkerStatus,
}

/// Decides whether a thread has to be downloaded
///
/// A thread is skipped when it has stored posts, no reply in the catalog is
/// newer than the highest-numbered stored post and the catalog reply count
/// equals the stored post count minus the opening post.
pub fn needs_update(entry: &CatalogEntry, snapshot: Option<&ThreadSnapshot>) -> bool {
    let snapshot = match snapshot {
        Some(snapshot) if snapshot.post_count > 0 => snapshot,
        _ => return true,
    };

    let no_new_reply = match snapshot.last_post_time {
        Some(last) => entry.last_reply_time <= last,
        None => false,
    };
    let same_count = u64::from(entry.replies) + 1 == u64::from(snapshot.post_count);

    !(no_new_reply && same_count)
}

/// Stored post numbers that no longer exist remotely, ascending
pub fn plan_removals(stored: &[i64], remote: &HashSet<i64>) -> Vec<i64> {
    let mut removals: Vec<i64> = stored
        .iter()
        .copied()
        .filter(|number| !remote.contains(number))
        .collect();
    removals.sort_unstable();
    removals
}

/// Updates a single thread
pub struct ThreadWorker {
    ctx: Arc<WorkerContext>,
    entry: CatalogEntry,
}

impl ThreadWorker {
    pub fn new(ctx: Arc<WorkerContext>, entry: CatalogEntry) -> Self {
        Self { ctx, entry }
    }

    /// Processes the thread and reports what happened
    ///
    /// Errors are logged here and returned inside the outcome; the statistics
    /// gathered up to the failure are kept.
    pub async fn run(self) -> WorkerOutcome {
        let stats = RunStats::new();
        stats.incr(Counter::ProcessedThreads);

        let status = match self.process(&stats).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(
                    "/{}/ thread {} not updated: {}",
                    self.ctx.board,
                    self.entry.number,
                    e
                );
                WorkerStatus::Failed(e)
            }
        };

        WorkerOutcome {
            thread: self.entry.number,
            stats,
            status,
        }
    }

    async fn process(&self, stats: &RunStats) -> Result<WorkerStatus> {
        if self.entry.replies < self.ctx.replies_threshold {
            return Ok(WorkerStatus::BelowThreshold);
        }

        let snapshot = self.load_snapshot()?;
        if !needs_update(&self.entry, snapshot.as_ref()) {
            tracing::debug!(
                "/{}/ thread {} is up to date",
                self.ctx.board,
                self.entry.number
            );
            return Ok(WorkerStatus::UpToDate);
        }

        let remote = self
            .ctx
            .api
            .get_thread(&self.ctx.board, self.entry.number, stats)
            .await
            .map_err(|e| ArchiverError::ThreadFetch {
                thread: self.entry.number,
                source: Box::new(e),
            })?;

        let last_number = snapshot.and_then(|s| s.last_post_number);
        let mut remote_numbers = HashSet::with_capacity(remote.posts.len());
        let mut added = 0;

        for post in &remote.posts {
            remote_numbers.insert(post.no);
            if last_number.map_or(true, |last| post.no > last) {
                self.add_message(MessageData::from(post), stats).await?;
                added += 1;
            }
        }

        let removed = self.remove_absent(&remote_numbers, stats)?;

        tracing::debug!(
            "/{}/ thread {}: {} added, {} removed",
            self.ctx.board,
            self.entry.number,
            added,
            removed
        );
        Ok(WorkerStatus::Updated { added, removed })
    }

    fn load_snapshot(&self) -> Result<Option<ThreadSnapshot>> {
        with_storage(&self.ctx.storage, |storage| {
            let snapshot = match storage.get_thread(&self.ctx.board, self.entry.number)? {
                Some(thread) => Some(storage.thread_snapshot(thread.id)?),
                None => None,
            };
            Ok(snapshot)
        })
    }

    /// Downloads the attachment of a message, then stores it and runs triggers
    async fn add_message(&self, message: MessageData, stats: &RunStats) -> Result<()> {
        let media = match &message.attachment {
            Some(attachment) => Some(
                self.download_media(attachment, stats)
                    .await
                    .map_err(|e| ArchiverError::Attachment {
                        post: message.number,
                        source: Box::new(e),
                    })?,
            ),
            None => None,
        };

        self.store_message(&message, media.as_ref(), stats)
    }

    async fn download_media(
        &self,
        attachment: &Attachment,
        stats: &RunStats,
    ) -> Result<DownloadedMedia> {
        let image = self
            .ctx
            .api
            .get_image(&self.ctx.board, attachment, stats)
            .await?;
        let thumbnail = self
            .ctx
            .api
            .get_thumbnail(&self.ctx.board, attachment, stats)
            .await?;

        Ok(DownloadedMedia {
            attachment: attachment.clone(),
            image,
            thumbnail,
        })
    }

    fn store_message(
        &self,
        message: &MessageData,
        media: Option<&DownloadedMedia>,
        stats: &RunStats,
    ) -> Result<()> {
        with_storage(&self.ctx.storage, |storage| {
            let mut thread =
                storage.add_post(&self.ctx.board, self.entry.number, message, media)?;
            stats.incr(Counter::AddedPosts);

            let applied = self.ctx.triggers.handle(storage, &mut thread, message)?;
            if !applied.is_empty() {
                tracing::info!(
                    "/{}/ thread {} post {}: retained={} tags={:?}",
                    self.ctx.board,
                    thread.number,
                    message.number,
                    applied.retained,
                    applied.tags_added
                );
            }
            Ok(())
        })
    }

    /// Deletes stored posts missing from the remote post list
    fn remove_absent(&self, remote: &HashSet<i64>, stats: &RunStats) -> Result<u64> {
        with_storage(&self.ctx.storage, |storage| {
            let thread = match storage.get_thread(&self.ctx.board, self.entry.number)? {
                Some(thread) => thread,
                None => return Ok(0),
            };

            let stored = storage.post_numbers(thread.id)?;
            let mut removed = 0;
            for number in plan_removals(&stored, remote) {
                if storage.delete_post(thread.id, number)? {
                    stats.incr(Counter::RemovedPosts);
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::from_unix;

    fn entry(replies: u32, last_reply: i64) -> CatalogEntry {
        CatalogEntry {
            number: 100,
            last_reply_time: from_unix(last_reply),
            replies,
        }
    }

    fn snapshot(post_count: u32, last_time: i64) -> ThreadSnapshot {
        ThreadSnapshot {
            post_count,
            last_post_number: Some(100 + i64::from(post_count) - 1),
            last_post_time: Some(from_unix(last_time)),
        }
    }

    #[test]
    fn test_unknown_thread_needs_update() {
        assert!(needs_update(&entry(30, 1000), None));
    }

    #[test]
    fn test_empty_thread_needs_update() {
        assert!(needs_update(&entry(0, 1000), Some(&ThreadSnapshot::default())));
    }

    #[test]
    fn test_unchanged_thread_is_skipped() {
        assert!(!needs_update(&entry(30, 1000), Some(&snapshot(31, 1000))));
        assert!(!needs_update(&entry(30, 900), Some(&snapshot(31, 1000))));
    }

    #[test]
    fn test_newer_reply_needs_update() {
        assert!(needs_update(&entry(30, 1001), Some(&snapshot(31, 1000))));
    }

    #[test]
    fn test_count_mismatch_needs_update() {
        // A deleted reply keeps the last reply time but lowers the count
        assert!(needs_update(&entry(29, 1000), Some(&snapshot(31, 1000))));
        assert!(needs_update(&entry(31, 1000), Some(&snapshot(31, 1000))));
    }

    #[test]
    fn test_plan_removals() {
        let remote: HashSet<i64> = [1, 3, 4].into_iter().collect();
        assert_eq!(plan_removals(&[1, 2, 3], &remote), vec![2]);
    }

    #[test]
    fn test_plan_removals_everything_gone() {
        assert_eq!(plan_removals(&[3, 1, 2], &HashSet::new()), vec![1, 2, 3]);
    }

    #[test]
    fn test_plan_removals_nothing_gone() {
        let remote: HashSet<i64> = [1, 2, 3, 4].into_iter().collect();
        assert!(plan_removals(&[1, 2, 3], &remote).is_empty());
    }
}
