//! Configuration module for Chan-Archiver
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use chan_archiver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Scraper will use {} workers", config.scraper.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, BoardEntry, Config, OutputConfig, ScraperConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
