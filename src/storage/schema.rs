//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Chan-Archiver database.
//! Post and thread timestamps are UNIX seconds; run timestamps are RFC 3339 text.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Boards to archive
CREATE TABLE IF NOT EXISTS boards (
    name TEXT PRIMARY KEY,
    active INTEGER NOT NULL DEFAULT 1,
    replies_threshold INTEGER NOT NULL DEFAULT 20,
    store_threads_for INTEGER NOT NULL DEFAULT 48
);

-- Archived threads with denormalized counters
CREATE TABLE IF NOT EXISTS threads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    board TEXT NOT NULL,
    number INTEGER NOT NULL,
    saved INTEGER NOT NULL DEFAULT 0,
    auto_saved INTEGER NOT NULL DEFAULT 0,
    replies INTEGER NOT NULL DEFAULT 0,
    images INTEGER NOT NULL DEFAULT 0,
    first_reply INTEGER,
    last_reply INTEGER,
    UNIQUE(board, number)
);

CREATE INDEX IF NOT EXISTS idx_threads_last_reply ON threads(last_reply);

-- Archived posts
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    number INTEGER NOT NULL,
    time INTEGER NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    trip TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    country TEXT NOT NULL DEFAULT '',
    subject TEXT NOT NULL DEFAULT '',
    comment TEXT NOT NULL DEFAULT '',
    save_time TEXT NOT NULL,
    UNIQUE(thread_id, number)
);

CREATE INDEX IF NOT EXISTS idx_posts_thread ON posts(thread_id);

-- Post attachments (paths relative to the media root)
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL UNIQUE REFERENCES posts(id) ON DELETE CASCADE,
    original_name TEXT NOT NULL DEFAULT '',
    image TEXT NOT NULL,
    thumbnail TEXT NOT NULL
);

-- Tags and their association with threads
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS tag_to_thread (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    automatically_added INTEGER NOT NULL DEFAULT 0,
    save_time TEXT NOT NULL,
    UNIQUE(thread_id, tag_id)
);

-- Trigger rules
CREATE TABLE IF NOT EXISTS triggers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    field TEXT NOT NULL,
    event TEXT NOT NULL,
    phrase TEXT NOT NULL DEFAULT '',
    case_sensitive INTEGER NOT NULL DEFAULT 1,
    post_type TEXT NOT NULL DEFAULT 'any',
    save_thread INTEGER NOT NULL DEFAULT 0,
    tag_id INTEGER REFERENCES tags(id) ON DELETE SET NULL,
    active INTEGER NOT NULL DEFAULT 1
);

-- One record per crawl of a board
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    board TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    used_workers INTEGER NOT NULL,
    total_time REAL NOT NULL DEFAULT 0,
    wait_time REAL NOT NULL DEFAULT 0,
    download_time REAL NOT NULL DEFAULT 0,
    processed_threads INTEGER NOT NULL DEFAULT 0,
    added_posts INTEGER NOT NULL DEFAULT 0,
    removed_posts INTEGER NOT NULL DEFAULT 0,
    downloaded_images INTEGER NOT NULL DEFAULT 0,
    downloaded_thumbnails INTEGER NOT NULL DEFAULT 0,
    downloaded_threads INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_runs_board ON runs(board);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
