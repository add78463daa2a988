//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::api::MessageData;
use crate::storage::{
    BoardRecord, DownloadedMedia, ImageRecord, PostRecord, RunRecord, RunUpdate, TagLink,
    TagRecord, ThreadRecord, ThreadSnapshot,
};
use crate::triggers::TriggerRule;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Thread not found: {0}")]
    ThreadNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines the persistence operations the crawler consumes.
/// Callers serialize access themselves; implementations are not required
/// to be shareable between threads.
pub trait Storage {
    // ===== Boards =====

    /// Inserts a board or replaces its settings
    fn upsert_board(&mut self, board: &BoardRecord) -> StorageResult<()>;

    fn get_board(&self, name: &str) -> StorageResult<Option<BoardRecord>>;

    fn list_boards(&self) -> StorageResult<Vec<BoardRecord>>;

    // ===== Run Management =====

    /// Creates a new run in the `running` state and returns its ID
    fn create_run(&mut self, board: &str, used_workers: u32) -> StorageResult<i64>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Writes the final status and statistics of a run
    fn finish_run(&mut self, run_id: i64, update: &RunUpdate) -> StorageResult<()>;

    /// Most recent runs first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    // ===== Threads =====

    fn get_thread(&self, board: &str, number: i64) -> StorageResult<Option<ThreadRecord>>;

    /// Summarizes the posts stored for a thread
    fn thread_snapshot(&self, thread_id: i64) -> StorageResult<ThreadSnapshot>;

    fn set_thread_retention(
        &mut self,
        thread_id: i64,
        saved: bool,
        auto_saved: bool,
    ) -> StorageResult<()>;

    // ===== Posts =====

    /// Stores a post, creating its thread first if needed
    ///
    /// Thread creation, the post and its image are committed together or not
    /// at all. Media files are written before the transaction and removed if
    /// it fails. Returns the updated thread.
    fn add_post(
        &mut self,
        board: &str,
        thread_number: i64,
        message: &MessageData,
        media: Option<&DownloadedMedia>,
    ) -> StorageResult<ThreadRecord>;

    /// Deletes a post with its image and media files
    ///
    /// Returns false if no such post is stored.
    fn delete_post(&mut self, thread_id: i64, number: i64) -> StorageResult<bool>;

    /// Numbers of all stored posts of a thread, ascending
    fn post_numbers(&self, thread_id: i64) -> StorageResult<Vec<i64>>;

    fn get_post(&self, thread_id: i64, number: i64) -> StorageResult<Option<PostRecord>>;

    fn get_image(&self, post_id: i64) -> StorageResult<Option<ImageRecord>>;

    // ===== Tags =====

    fn create_tag(&mut self, name: &str) -> StorageResult<i64>;

    fn tag_by_name(&self, name: &str) -> StorageResult<Option<TagRecord>>;

    fn thread_has_tag(&self, thread_id: i64, tag_id: i64) -> StorageResult<bool>;

    /// Associates a tag with a thread; an existing association is kept as is
    fn add_thread_tag(&mut self, thread_id: i64, tag_id: i64, automatic: bool)
        -> StorageResult<()>;

    fn thread_tags(&self, thread_id: i64) -> StorageResult<Vec<TagLink>>;

    // ===== Triggers =====

    fn insert_trigger(&mut self, rule: &TriggerRule) -> StorageResult<i64>;

    /// Loads every active trigger rule
    fn load_active_triggers(&self) -> StorageResult<Vec<TriggerRule>>;
}
