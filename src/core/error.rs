use thiserror::Error;

/// Errors produced while resolving a URL into playable media.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No registered extractor claims the URL.
    #[error("no suitable extractor found for URL: {0}")]
    UnsupportedUrl(String),

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to parse JSON from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse HLS manifest from {url}: {message}")]
    Manifest { url: String, message: String },

    #[error("invalid URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("no videos found for {0}")]
    NoContent(String),

    /// The content is only playable from the listed countries.
    #[error("content is geo-restricted, available in: {}", .countries.join(", "))]
    GeoRestricted { countries: Vec<String> },
}

pub type Result<T> = std::result::Result<T, ExtractError>;
