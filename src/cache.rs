use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use crate::error::WishlistError;

/// A cached response: the body and the URL it finally came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPage {
    pub url: String,
    pub body: String,
}

/// On-disk cache of response bodies, one file per requested URL.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Entries that no longer decode are treated as misses.
    pub async fn get(&self, url: &str) -> Result<Option<CachedPage>, WishlistError> {
        let path = self.path_for(url);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(WishlistError::io(path, err)),
        };

        match serde_json::from_str(&raw) {
            Ok(page) => {
                debug!(url, path = %path.display(), "cache hit");
                Ok(Some(page))
            }
            Err(err) => {
                debug!(url, path = %path.display(), error = %err, "ignoring unreadable cache entry");
                Ok(None)
            }
        }
    }

    /// Stores `page` under the URL that was requested, which may differ from `page.url`.
    pub async fn put(&self, requested_url: &str, page: &CachedPage) -> Result<(), WishlistError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| WishlistError::io(&self.dir, err))?;
        let path = self.path_for(requested_url);
        let json = serde_json::to_string(page).map_err(|source| WishlistError::CacheEncode {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json)
            .await
            .map_err(|err| WishlistError::io(path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_returns_pages_by_requested_url() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().join("cache"));
        let url = "https://www.amazon.com/hz/wishlist/ls/ABC";
        let page = CachedPage {
            url: "https://www.amazon.com/hz/wishlist/ls/ABC/moved".to_string(),
            body: "<ul></ul>".to_string(),
        };

        assert_eq!(cache.get(url).await.unwrap(), None);

        cache.put(url, &page).await.unwrap();

        assert_eq!(cache.get(url).await.unwrap(), Some(page));
        assert_eq!(cache.get("https://www.amazon.com/other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unreadable_entries_are_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path());
        let url = "https://www.amazon.com/hz/wishlist/ls/ABC";
        std::fs::write(cache.path_for(url), "<ul></ul>").unwrap();

        assert_eq!(cache.get(url).await.unwrap(), None);
    }
}
