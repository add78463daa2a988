//! Chan-Archiver: an incremental thread archiver
//!
//! This crate mirrors discussion threads from a rate-limited catalog/thread
//! JSON API into a SQLite database, downloading attached media and applying
//! trigger rules that retain or tag threads automatically.

pub mod api;
pub mod config;
pub mod crawler;
pub mod output;
pub mod storage;
pub mod triggers;

use thiserror::Error;

/// Main error type for Chan-Archiver operations
#[derive(Debug, Error)]
pub enum ArchiverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("Unable to download the catalog of /{board}/: {source}")]
    Catalog {
        board: String,
        source: Box<ArchiverError>,
    },

    #[error("Unable to download thread {thread}: {source}")]
    ThreadFetch {
        thread: i64,
        source: Box<ArchiverError>,
    },

    #[error("Unable to download the attachment of post {post}: {source}")]
    Attachment {
        post: i64,
        source: Box<ArchiverError>,
    },

    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned: {0}")]
    StorageLock(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid board name: {0}")]
    InvalidBoard(String),
}

/// Result type alias for Chan-Archiver operations
pub type Result<T> = std::result::Result<T, ArchiverError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Coordinator};
pub use output::RunStats;
pub use triggers::{Action, TriggerEngine, TriggerRule};
