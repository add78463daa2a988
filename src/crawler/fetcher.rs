//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Spacing requests through the shared `RateGate`
//! - Timing downloads and counting fetched resources
//! - Error classification

use crate::api::{Attachment, Catalog, CatalogPage, Endpoints, RemoteThread};
use crate::config::UserAgentConfig;
use crate::crawler::gate::{RateGate, RequestClass};
use crate::output::{Counter, RunStats, Timer};
use crate::{ArchiverError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use chan_archiver::config::UserAgentConfig;
/// use chan_archiver::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "ChanArchiver".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> std::result::Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Client for the catalog/thread API and the media hosts
///
/// Every request first passes the rate gate of its class; the time spent
/// transferring the response is added to `Timer::Download`.
pub struct ApiClient {
    client: Client,
    endpoints: Endpoints,
    gate: RateGate,
}

impl ApiClient {
    pub fn new(client: Client, endpoints: Endpoints, gate: RateGate) -> Self {
        Self {
            client,
            endpoints,
            gate,
        }
    }

    /// Downloads and flattens the catalog of a board
    pub async fn get_catalog(&self, board: &str, stats: &RunStats) -> Result<Catalog> {
        let url = self.endpoints.catalog(board);
        let body = self.fetch(RequestClass::Api, &url, stats).await?;
        let pages: Vec<CatalogPage> = decode(&url, &body)?;
        Ok(Catalog::from_pages(&pages))
    }

    /// Downloads the full post list of a thread
    pub async fn get_thread(
        &self,
        board: &str,
        number: i64,
        stats: &RunStats,
    ) -> Result<RemoteThread> {
        let url = self.endpoints.thread(board, number);
        stats.incr(Counter::DownloadedThreads);
        let body = self.fetch(RequestClass::Api, &url, stats).await?;
        decode(&url, &body)
    }

    /// Downloads the full-size file of an attachment
    pub async fn get_image(
        &self,
        board: &str,
        attachment: &Attachment,
        stats: &RunStats,
    ) -> Result<Vec<u8>> {
        let url = self
            .endpoints
            .image(board, attachment.file_id, &attachment.extension);
        stats.incr(Counter::DownloadedImages);
        self.fetch(RequestClass::File, &url, stats).await
    }

    /// Downloads the thumbnail of an attachment
    pub async fn get_thumbnail(
        &self,
        board: &str,
        attachment: &Attachment,
        stats: &RunStats,
    ) -> Result<Vec<u8>> {
        let url = self.endpoints.thumbnail(board, attachment.file_id);
        stats.incr(Counter::DownloadedThumbnails);
        self.fetch(RequestClass::File, &url, stats).await
    }

    async fn fetch(&self, class: RequestClass, url: &str, stats: &RunStats) -> Result<Vec<u8>> {
        self.gate.wait(class, stats).await;

        let started = Instant::now();
        let result = self.download(url).await;
        stats.add_time(Timer::Download, started.elapsed());

        tracing::trace!("GET {} finished in {:?}", url, started.elapsed());
        result
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchiverError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?;
        Ok(body.to_vec())
    }
}

/// Maps a transport error onto the crate error type
fn classify_error(url: &str, error: reqwest::Error) -> ArchiverError {
    if error.is_timeout() {
        ArchiverError::Timeout {
            url: url.to_string(),
        }
    } else {
        ArchiverError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|source| ArchiverError::Decode {
        url: url.to_string(),
        source,
    })
}
