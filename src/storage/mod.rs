//! Storage module for persisting archived data
//!
//! This module handles all database operations for the archiver, including:
//! - SQLite database initialization and schema management
//! - Threads, posts and images, with denormalized thread counters
//! - Media files on disk, tied to the lifetime of their post
//! - Tags, trigger rules and run records

mod media;
mod schema;
mod sqlite;
mod traits;

pub use media::{DownloadedMedia, MediaStore, StoredMedia};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::BoardEntry;
use crate::output::{per_worker_seconds, RunTotals};
use crate::ArchiverError;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
/// * `media_root` - Directory where images and thumbnails are written
pub fn open_storage(path: &Path, media_root: &Path) -> Result<SqliteStorage, ArchiverError> {
    SqliteStorage::new(path, media_root)
}

/// Board settings as stored in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardRecord {
    pub name: String,
    pub active: bool,
    pub replies_threshold: u32,
    pub store_threads_for: u32,
}

impl From<&BoardEntry> for BoardRecord {
    fn from(entry: &BoardEntry) -> Self {
        Self {
            name: entry.name.clone(),
            active: entry.active,
            replies_threshold: entry.replies_threshold,
            store_threads_for: entry.store_threads_for,
        }
    }
}

/// Represents an archived thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRecord {
    pub id: i64,
    pub board: String,
    pub number: i64,
    /// Protected from the retention sweep
    pub saved: bool,
    /// Retained by a trigger rather than by hand
    pub auto_saved: bool,
    /// Stored posts, opening post included
    pub replies: u32,
    pub images: u32,
    pub first_reply: Option<DateTime<Utc>>,
    pub last_reply: Option<DateTime<Utc>>,
}

/// What the crawler needs to know about the posts already stored for a thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub post_count: u32,
    pub last_post_number: Option<i64>,
    /// Time of the highest-numbered stored post
    pub last_post_time: Option<DateTime<Utc>>,
}

/// Represents an archived post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: i64,
    pub thread_id: i64,
    pub number: i64,
    pub time: DateTime<Utc>,
    pub name: String,
    pub trip: String,
    pub email: String,
    pub country: String,
    pub subject: String,
    pub comment: String,
}

/// Represents an archived image; paths are relative to the media root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: i64,
    pub post_id: i64,
    pub original_name: String,
    pub image: String,
    pub thumbnail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
}

/// Association between a thread and a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLink {
    pub thread_id: i64,
    pub tag_id: i64,
    pub automatically_added: bool,
    pub save_time: String,
}

/// Represents a crawl run of one board
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub board: String,
    pub status: RunStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub used_workers: u32,
    pub total_time: f64,
    /// Lock-inclusive rate gate wait, divided by the worker count (seconds)
    pub wait_time: f64,
    /// Download time divided by the worker count (seconds)
    pub download_time: f64,
    pub processed_threads: u64,
    pub added_posts: u64,
    pub removed_posts: u64,
    pub downloaded_images: u64,
    pub downloaded_thumbnails: u64,
    pub downloaded_threads: u64,
}

/// Final values written to a run record
#[derive(Debug, Clone, PartialEq)]
pub struct RunUpdate {
    pub status: RunStatus,
    pub total_time: f64,
    pub wait_time: f64,
    pub download_time: f64,
    pub totals: RunTotals,
}

impl RunUpdate {
    pub fn new(status: RunStatus, totals: RunTotals, elapsed: Duration, workers: usize) -> Self {
        Self {
            status,
            total_time: elapsed.as_secs_f64(),
            wait_time: per_worker_seconds(totals.wait_time_with_lock, workers),
            download_time: per_worker_seconds(totals.download_time, workers),
            totals,
        }
    }
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
            let parsed = RunStatus::from_db_string(status.to_db_string());
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("interrupted"), None);
    }

    #[test]
    fn test_run_update_divides_by_workers() {
        let totals = RunTotals {
            wait_time_with_lock: Duration::from_secs(40),
            download_time: Duration::from_secs(8),
            ..RunTotals::default()
        };

        let update = RunUpdate::new(RunStatus::Completed, totals, Duration::from_secs(30), 4);
        assert_eq!(update.total_time, 30.0);
        assert_eq!(update.wait_time, 10.0);
        assert_eq!(update.download_time, 2.0);
    }
}
