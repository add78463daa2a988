use crate::config::types::{
    ApiConfig, BoardEntry, Config, OutputConfig, ScraperConfig, UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_api_config(&config.api)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_boards(&config.boards)?;
    Ok(())
}

/// Validates scraper configuration
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.connection_timeout < 1 {
        return Err(ConfigError::Validation(
            "connection_timeout must be >= 1s".to_string(),
        ));
    }

    Ok(())
}

/// Validates the API base URLs
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("api_url", &config.api_url),
        ("image_url", &config.image_url),
        ("thumbnail_url", &config.thumbnail_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", key, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "{} must use http or https, got '{}'",
                key, value
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.media_path.is_empty() {
        return Err(ConfigError::Validation(
            "media_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates board entries: names must be unique, short and alphanumeric
fn validate_boards(boards: &[BoardEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for board in boards {
        validate_board_name(&board.name)?;

        if !seen.insert(board.name.as_str()) {
            return Err(ConfigError::InvalidBoard(format!(
                "board '{}' is declared more than once",
                board.name
            )));
        }
    }

    Ok(())
}

fn validate_board_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::InvalidBoard(
            "Board name cannot be empty".to_string(),
        ));
    }

    if name.len() > 16 || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::InvalidBoard(format!(
            "Board name '{}' must be at most 16 ASCII letters or digits",
            name
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
