//! Remote API data model
//!
//! This module describes what the catalog/thread JSON API returns and turns it
//! into the types the crawler works with:
//! - `Catalog`: a flattened, single-pass sequence of `CatalogEntry` values
//! - `MessageData`: one post with its text cleaned of HTML markup
//! - `Endpoints`: URL construction for the four resources the crawler fetches

mod catalog;
mod endpoints;
mod message;

pub use catalog::{Catalog, CatalogEntry, CatalogPage, CatalogThread, LastReply};
pub use endpoints::Endpoints;
pub use message::{
    clean_markup, sanitize_extension, Attachment, MessageData, RemotePost, RemoteThread,
};

use chrono::{DateTime, Utc};

/// Converts a UNIX timestamp from the API into a UTC datetime
///
/// Out-of-range values collapse to the UNIX epoch.
pub(crate) fn from_unix(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}
