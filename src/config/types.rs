use serde::Deserialize;

/// Main configuration structure for Chan-Archiver
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "board")]
    pub boards: Vec<BoardEntry>,
}

impl Config {
    /// Looks up a configured board by name
    pub fn board(&self, name: &str) -> Option<&BoardEntry> {
        self.boards.iter().find(|b| b.name == name)
    }
}

/// Scraper behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Number of threads processed concurrently
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Minimum time between two API requests (milliseconds)
    #[serde(rename = "api-wait", default = "default_api_wait")]
    pub api_wait: u64,

    /// Minimum time between two file downloads (milliseconds)
    #[serde(rename = "file-wait", default = "default_file_wait")]
    pub file_wait: u64,

    /// Per-request connection timeout (seconds)
    #[serde(rename = "connection-timeout", default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

fn default_workers() -> u32 {
    10
}

fn default_api_wait() -> u64 {
    1000
}

fn default_file_wait() -> u64 {
    100
}

fn default_connection_timeout() -> u64 {
    10
}

/// Remote API hosts
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL serving catalog and thread JSON
    #[serde(rename = "api-url")]
    pub api_url: String,

    /// Base URL serving full-size attachments
    #[serde(rename = "image-url")]
    pub image_url: String,

    /// Base URL serving thumbnails
    #[serde(rename = "thumbnail-url")]
    pub thumbnail_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://a.4cdn.org".to_string(),
            image_url: "https://i.4cdn.org".to_string(),
            thumbnail_url: "https://t.4cdn.org".to_string(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory where images and thumbnails are stored
    #[serde(rename = "media-path")]
    pub media_path: String,
}

/// A board to archive
#[derive(Debug, Clone, Deserialize)]
pub struct BoardEntry {
    /// Board name as used by the API (e.g., "g")
    pub name: String,

    /// Whether this board is updated with new posts
    #[serde(default = "default_active")]
    pub active: bool,

    /// Threads are stored once they reach this many replies
    #[serde(rename = "replies-threshold", default = "default_replies_threshold")]
    pub replies_threshold: u32,

    /// Hours after the last reply before an unsaved thread may be swept (0 = forever)
    #[serde(rename = "store-threads-for", default = "default_store_threads_for")]
    pub store_threads_for: u32,
}

fn default_active() -> bool {
    true
}

fn default_replies_threshold() -> u32 {
    20
}

fn default_store_threads_for() -> u32 {
    48
}
