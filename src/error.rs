use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Errors returned while building or scraping a wishlist.
#[derive(Debug, Error)]
pub enum WishlistError {
    #[error("URL '{url}' could not be parsed: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("URL '{0}' is not an absolute URL to an Amazon wishlist")]
    NotAbsolute(String),
    #[error("URL '{0}' does not look like an Amazon wishlist URL")]
    NotMarketplace(String),
    #[error("ID '{0}' does not look like an Amazon wishlist ID")]
    EmptyId(String),
    #[error("ID '{0}' contains URL characters; pass it as an absolute wishlist URL instead")]
    InvalidId(String),
    #[error("invalid proxy URL '{url}': {source}")]
    InvalidProxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid selector `{0}`")]
    Selector(String),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("Amazon is not showing the wishlist at {url} because it thinks we're a robot")]
    Blocked { url: String },
    #[error("filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode cache entry {path}: {source}")]
    CacheEncode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("page task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("scraping did not finish within {0:?}")]
    Timeout(Duration),
}

impl WishlistError {
    pub fn request(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the marketplace served its anti-bot interstitial.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}
