//! Board catalog parsing
//!
//! The catalog endpoint returns an array of pages, each listing the threads
//! on that page with lightweight metadata. The crawler only needs one flat,
//! ordered pass over those threads, so the pages are flattened into a
//! `Catalog` iterator as soon as they are decoded.

use crate::api::from_unix;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One page of the catalog as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub page: u32,

    #[serde(default)]
    pub threads: Vec<CatalogThread>,
}

/// A thread summary as listed in the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogThread {
    pub no: i64,

    /// Creation time of the thread (UNIX seconds)
    pub time: i64,

    /// Number of replies, the opening post is not counted
    #[serde(default)]
    pub replies: u32,

    /// Most recent replies, oldest first
    #[serde(default)]
    pub last_replies: Vec<LastReply>,
}

/// Minimal view of a reply listed in the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct LastReply {
    pub no: i64,
    pub time: i64,
}

/// Thread descriptor used to decide whether a thread must be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub number: i64,
    pub last_reply_time: DateTime<Utc>,
    pub replies: u32,
}

impl From<&CatalogThread> for CatalogEntry {
    fn from(thread: &CatalogThread) -> Self {
        let last_reply = thread
            .last_replies
            .last()
            .map(|reply| reply.time)
            .unwrap_or(thread.time);

        Self {
            number: thread.no,
            last_reply_time: from_unix(last_reply),
            replies: thread.replies,
        }
    }
}

/// Finite, single-pass sequence of catalog entries in catalog order
///
/// Once an entry has been taken it cannot be produced again; a new catalog
/// has to be fetched to start over.
#[derive(Debug)]
pub struct Catalog {
    entries: std::vec::IntoIter<CatalogEntry>,
}

impl Catalog {
    /// Flattens decoded catalog pages into a single sequence
    pub fn from_pages(pages: &[CatalogPage]) -> Self {
        let entries: Vec<CatalogEntry> = pages
            .iter()
            .flat_map(|page| page.threads.iter())
            .map(CatalogEntry::from)
            .collect();

        Self {
            entries: entries.into_iter(),
        }
    }

    /// Number of entries not yet consumed
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl Iterator for Catalog {
    type Item = CatalogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Catalog {}
