//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::api::{from_unix, MessageData};
use crate::storage::media::{DownloadedMedia, MediaStore, StoredMedia};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    BoardRecord, ImageRecord, PostRecord, RunRecord, RunStatus, RunUpdate, TagLink, TagRecord,
    ThreadRecord, ThreadSnapshot,
};
use crate::triggers::{PostType, RuleField, RuleOperator, TriggerRule};
use crate::ArchiverError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const THREAD_COLUMNS: &str =
    "id, board, number, saved, auto_saved, replies, images, first_reply, last_reply";

const RUN_COLUMNS: &str = "id, board, status, started_at, finished_at, used_workers, \
     total_time, wait_time, download_time, processed_threads, added_posts, removed_posts, \
     downloaded_images, downloaded_thumbnails, downloaded_threads";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    media: MediaStore,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `media_root` - Directory below which attachments are written
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ArchiverError)` - Failed to open database
    pub fn new(path: &Path, media_root: &Path) -> Result<Self, ArchiverError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            media: MediaStore::new(media_root),
        })
    }

    /// Creates an in-memory database (for testing)
    ///
    /// Media files go to a fresh directory below the system temp dir.
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, ArchiverError> {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static NEXT: AtomicUsize = AtomicUsize::new(0);

        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;

        let media_root = std::env::temp_dir().join(format!(
            "chan-archiver-test-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        Ok(Self {
            conn,
            media: MediaStore::new(media_root),
        })
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }
}

fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<ThreadRecord> {
    Ok(ThreadRecord {
        id: row.get(0)?,
        board: row.get(1)?,
        number: row.get(2)?,
        saved: row.get(3)?,
        auto_saved: row.get(4)?,
        replies: row.get(5)?,
        images: row.get(6)?,
        first_reply: row.get::<_, Option<i64>>(7)?.map(from_unix),
        last_reply: row.get::<_, Option<i64>>(8)?.map(from_unix),
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        board: row.get(1)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(2)?)
            .unwrap_or(RunStatus::Running),
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        used_workers: row.get(5)?,
        total_time: row.get(6)?,
        wait_time: row.get(7)?,
        download_time: row.get(8)?,
        processed_threads: row.get::<_, i64>(9)? as u64,
        added_posts: row.get::<_, i64>(10)? as u64,
        removed_posts: row.get::<_, i64>(11)? as u64,
        downloaded_images: row.get::<_, i64>(12)? as u64,
        downloaded_thumbnails: row.get::<_, i64>(13)? as u64,
        downloaded_threads: row.get::<_, i64>(14)? as u64,
    })
}

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<BoardRecord> {
    Ok(BoardRecord {
        name: row.get(0)?,
        active: row.get(1)?,
        replies_threshold: row.get(2)?,
        store_threads_for: row.get(3)?,
    })
}

fn read_thread(conn: &Connection, thread_id: i64) -> StorageResult<ThreadRecord> {
    conn.query_row(
        &format!("SELECT {} FROM threads WHERE id = ?1", THREAD_COLUMNS),
        params![thread_id],
        thread_from_row,
    )
    .optional()?
    .ok_or(StorageError::ThreadNotFound(thread_id))
}

/// Inserts a post (and its thread if new) in a single transaction
fn insert_post(
    conn: &mut Connection,
    board: &str,
    thread_number: i64,
    message: &MessageData,
    image: Option<(&str, &StoredMedia)>,
) -> StorageResult<ThreadRecord> {
    let tx = conn.transaction()?;

    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM threads WHERE board = ?1 AND number = ?2",
            params![board, thread_number],
            |row| row.get(0),
        )
        .optional()?;

    let thread_id = match existing {
        Some(id) => id,
        None => {
            tx.execute(
                "INSERT INTO threads (board, number) VALUES (?1, ?2)",
                params![board, thread_number],
            )?;
            tx.last_insert_rowid()
        }
    };

    let now = Utc::now().to_rfc3339();
    let time = message.time.timestamp();
    tx.execute(
        "INSERT INTO posts (thread_id, number, time, name, trip, email, country, subject, comment, save_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            thread_id,
            message.number,
            time,
            message.name,
            message.trip,
            message.email,
            message.country,
            message.subject,
            message.comment,
            now
        ],
    )?;
    let post_id = tx.last_insert_rowid();

    if let Some((original_name, stored)) = image {
        tx.execute(
            "INSERT INTO images (post_id, original_name, image, thumbnail) VALUES (?1, ?2, ?3, ?4)",
            params![post_id, original_name, stored.image, stored.thumbnail],
        )?;
    }

    tx.execute(
        "UPDATE threads SET
            replies = replies + 1,
            images = images + ?1,
            first_reply = CASE WHEN first_reply IS NULL OR ?2 < first_reply THEN ?2 ELSE first_reply END,
            last_reply = CASE WHEN last_reply IS NULL OR ?2 > last_reply THEN ?2 ELSE last_reply END
         WHERE id = ?3",
        params![image.is_some() as i64, time, thread_id],
    )?;

    let thread = read_thread(&tx, thread_id)?;
    tx.commit()?;

    Ok(thread)
}

impl Storage for SqliteStorage {
    // ===== Boards =====

    fn upsert_board(&mut self, board: &BoardRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO boards (name, active, replies_threshold, store_threads_for)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                active = excluded.active,
                replies_threshold = excluded.replies_threshold,
                store_threads_for = excluded.store_threads_for",
            params![
                board.name,
                board.active,
                board.replies_threshold,
                board.store_threads_for
            ],
        )?;
        Ok(())
    }

    fn get_board(&self, name: &str) -> StorageResult<Option<BoardRecord>> {
        let board = self
            .conn
            .query_row(
                "SELECT name, active, replies_threshold, store_threads_for FROM boards WHERE name = ?1",
                params![name],
                board_from_row,
            )
            .optional()?;
        Ok(board)
    }

    fn list_boards(&self) -> StorageResult<Vec<BoardRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, active, replies_threshold, store_threads_for FROM boards ORDER BY name",
        )?;
        let boards = stmt
            .query_map([], board_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(boards)
    }

    // ===== Run Management =====

    fn create_run(&mut self, board: &str, used_workers: u32) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (board, status, started_at, used_workers) VALUES (?1, ?2, ?3, ?4)",
            params![board, RunStatus::Running.to_db_string(), now, used_workers],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, update: &RunUpdate) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let totals = &update.totals;
        let changed = self.conn.execute(
            "UPDATE runs SET
                status = ?1, finished_at = ?2, total_time = ?3, wait_time = ?4, download_time = ?5,
                processed_threads = ?6, added_posts = ?7, removed_posts = ?8,
                downloaded_images = ?9, downloaded_thumbnails = ?10, downloaded_threads = ?11
             WHERE id = ?12",
            params![
                update.status.to_db_string(),
                now,
                update.total_time,
                update.wait_time,
                update.download_time,
                totals.processed_threads as i64,
                totals.added_posts as i64,
                totals.removed_posts as i64,
                totals.downloaded_images as i64,
                totals.downloaded_thumbnails as i64,
                totals.downloaded_threads as i64,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== Threads =====

    fn get_thread(&self, board: &str, number: i64) -> StorageResult<Option<ThreadRecord>> {
        let thread = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM threads WHERE board = ?1 AND number = ?2",
                    THREAD_COLUMNS
                ),
                params![board, number],
                thread_from_row,
            )
            .optional()?;
        Ok(thread)
    }

    fn thread_snapshot(&self, thread_id: i64) -> StorageResult<ThreadSnapshot> {
        let (post_count, last_post_number): (u32, Option<i64>) = self.conn.query_row(
            "SELECT COUNT(*), MAX(number) FROM posts WHERE thread_id = ?1",
            params![thread_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let last_post_time = self
            .conn
            .query_row(
                "SELECT time FROM posts WHERE thread_id = ?1 ORDER BY number DESC LIMIT 1",
                params![thread_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .map(from_unix);

        Ok(ThreadSnapshot {
            post_count,
            last_post_number,
            last_post_time,
        })
    }

    fn set_thread_retention(
        &mut self,
        thread_id: i64,
        saved: bool,
        auto_saved: bool,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE threads SET saved = ?1, auto_saved = ?2 WHERE id = ?3",
            params![saved, auto_saved, thread_id],
        )?;
        if changed == 0 {
            return Err(StorageError::ThreadNotFound(thread_id));
        }
        Ok(())
    }

    // ===== Posts =====

    fn add_post(
        &mut self,
        board: &str,
        thread_number: i64,
        message: &MessageData,
        media: Option<&DownloadedMedia>,
    ) -> StorageResult<ThreadRecord> {
        let stored = match media {
            Some(media) => Some(self.media.save(board, media)?),
            None => None,
        };

        let image = media
            .zip(stored.as_ref())
            .map(|(media, stored)| (media.attachment.original_filename.as_str(), stored));

        let result = insert_post(&mut self.conn, board, thread_number, message, image);
        if result.is_err() {
            if let Some(stored) = &stored {
                self.media.remove(stored);
            }
        }
        result
    }

    fn delete_post(&mut self, thread_id: i64, number: i64) -> StorageResult<bool> {
        let tx = self.conn.transaction()?;

        let post_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM posts WHERE thread_id = ?1 AND number = ?2",
                params![thread_id, number],
                |row| row.get(0),
            )
            .optional()?;

        let post_id = match post_id {
            Some(id) => id,
            None => return Ok(false),
        };

        let stored: Option<StoredMedia> = tx
            .query_row(
                "SELECT image, thumbnail FROM images WHERE post_id = ?1",
                params![post_id],
                |row| {
                    Ok(StoredMedia {
                        image: row.get(0)?,
                        thumbnail: row.get(1)?,
                    })
                },
            )
            .optional()?;

        tx.execute("DELETE FROM images WHERE post_id = ?1", params![post_id])?;
        tx.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;
        tx.execute(
            "UPDATE threads SET
                replies = replies - 1,
                images = images - ?1,
                first_reply = (SELECT MIN(time) FROM posts WHERE thread_id = ?2),
                last_reply = (SELECT MAX(time) FROM posts WHERE thread_id = ?2)
             WHERE id = ?2",
            params![stored.is_some() as i64, thread_id],
        )?;
        tx.commit()?;

        if let Some(stored) = &stored {
            self.media.remove(stored);
        }
        Ok(true)
    }

    fn post_numbers(&self, thread_id: i64) -> StorageResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT number FROM posts WHERE thread_id = ?1 ORDER BY number")?;
        let numbers = stmt
            .query_map(params![thread_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(numbers)
    }

    fn get_post(&self, thread_id: i64, number: i64) -> StorageResult<Option<PostRecord>> {
        let post = self
            .conn
            .query_row(
                "SELECT id, thread_id, number, time, name, trip, email, country, subject, comment
                 FROM posts WHERE thread_id = ?1 AND number = ?2",
                params![thread_id, number],
                |row| {
                    Ok(PostRecord {
                        id: row.get(0)?,
                        thread_id: row.get(1)?,
                        number: row.get(2)?,
                        time: from_unix(row.get(3)?),
                        name: row.get(4)?,
                        trip: row.get(5)?,
                        email: row.get(6)?,
                        country: row.get(7)?,
                        subject: row.get(8)?,
                        comment: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(post)
    }

    fn get_image(&self, post_id: i64) -> StorageResult<Option<ImageRecord>> {
        let image = self
            .conn
            .query_row(
                "SELECT id, post_id, original_name, image, thumbnail FROM images WHERE post_id = ?1",
                params![post_id],
                |row| {
                    Ok(ImageRecord {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        original_name: row.get(2)?,
                        image: row.get(3)?,
                        thumbnail: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(image)
    }

    // ===== Tags =====

    fn create_tag(&mut self, name: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM tags WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn tag_by_name(&self, name: &str) -> StorageResult<Option<TagRecord>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, name FROM tags WHERE name = ?1",
                params![name],
                |row| {
                    Ok(TagRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(tag)
    }

    fn thread_has_tag(&self, thread_id: i64, tag_id: i64) -> StorageResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tag_to_thread WHERE thread_id = ?1 AND tag_id = ?2",
            params![thread_id, tag_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn add_thread_tag(
        &mut self,
        thread_id: i64,
        tag_id: i64,
        automatic: bool,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO tag_to_thread (thread_id, tag_id, automatically_added, save_time)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(thread_id, tag_id) DO NOTHING",
            params![thread_id, tag_id, automatic, now],
        )?;
        Ok(())
    }

    fn thread_tags(&self, thread_id: i64) -> StorageResult<Vec<TagLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT thread_id, tag_id, automatically_added, save_time
             FROM tag_to_thread WHERE thread_id = ?1 ORDER BY tag_id",
        )?;
        let links = stmt
            .query_map(params![thread_id], |row| {
                Ok(TagLink {
                    thread_id: row.get(0)?,
                    tag_id: row.get(1)?,
                    automatically_added: row.get(2)?,
                    save_time: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    // ===== Triggers =====

    fn insert_trigger(&mut self, rule: &TriggerRule) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO triggers (field, event, phrase, case_sensitive, post_type, save_thread, tag_id, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                rule.field.to_db_string(),
                rule.operator.to_db_string(),
                rule.phrase,
                rule.case_sensitive,
                rule.post_type.to_db_string(),
                rule.retain_thread,
                rule.tag_id,
                rule.active
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn load_active_triggers(&self) -> StorageResult<Vec<TriggerRule>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, field, event, phrase, case_sensitive, post_type, save_thread, tag_id
             FROM triggers WHERE active = 1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, bool>(6)?,
                    row.get::<_, Option<i64>>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rules = Vec::with_capacity(rows.len());
        for (id, field, event, phrase, case_sensitive, post_type, save_thread, tag_id) in rows {
            let parsed = (
                RuleField::from_db_string(&field),
                RuleOperator::from_db_string(&event),
                PostType::from_db_string(&post_type),
            );
            match parsed {
                (Some(field), Some(operator), Some(post_type)) => rules.push(TriggerRule {
                    id,
                    field,
                    operator,
                    phrase,
                    case_sensitive,
                    post_type,
                    retain_thread: save_thread,
                    tag_id,
                    active: true,
                }),
                _ => tracing::warn!(
                    "Skipping trigger {}: unknown field '{}', event '{}' or post type '{}'",
                    id,
                    field,
                    event,
                    post_type
                ),
            }
        }

        Ok(rules)
    }
}
