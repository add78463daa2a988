use crate::config::ApiConfig;

/// URL builder for the remote API
#[derive(Debug, Clone)]
pub struct Endpoints {
    api: String,
    images: String,
    thumbnails: String,
}

impl Endpoints {
    /// Creates endpoints from the configured base URLs
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            api: config.api_url.trim_end_matches('/').to_string(),
            images: config.image_url.trim_end_matches('/').to_string(),
            thumbnails: config.thumbnail_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn catalog(&self, board: &str) -> String {
        format!("{}/{}/catalog.json", self.api, board)
    }

    pub fn thread(&self, board: &str, number: i64) -> String {
        format!("{}/{}/thread/{}.json", self.api, board, number)
    }

    pub fn image(&self, board: &str, file_id: i64, extension: &str) -> String {
        format!("{}/{}/{}{}", self.images, board, file_id, extension)
    }

    pub fn thumbnail(&self, board: &str, file_id: i64) -> String {
        format!("{}/{}/{}s.jpg", self.thumbnails, board, file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let endpoints = Endpoints::new(&ApiConfig::default());

        assert_eq!(endpoints.catalog("g"), "https://a.4cdn.org/g/catalog.json");
        assert_eq!(
            endpoints.thread("g", 123),
            "https://a.4cdn.org/g/thread/123.json"
        );
        assert_eq!(
            endpoints.image("g", 1700000000123, ".png"),
            "https://i.4cdn.org/g/1700000000123.png"
        );
        assert_eq!(
            endpoints.thumbnail("g", 1700000000123),
            "https://t.4cdn.org/g/1700000000123s.jpg"
        );
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let config = ApiConfig {
            api_url: "http://127.0.0.1:8080/".to_string(),
            image_url: "http://127.0.0.1:8080/i/".to_string(),
            thumbnail_url: "http://127.0.0.1:8080/t".to_string(),
        };
        let endpoints = Endpoints::new(&config);

        assert_eq!(endpoints.catalog("a"), "http://127.0.0.1:8080/a/catalog.json");
        assert_eq!(endpoints.image("a", 5, ".gif"), "http://127.0.0.1:8080/i/a/5.gif");
    }
}
