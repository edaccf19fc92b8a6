use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::WishlistConfig;
use crate::error::WishlistError;
use crate::fetcher::{FetchPage, HttpFetcher};
use crate::models::{ItemMap, accumulate};
use crate::parser::{self, PageExtract, PageSelectors};

const MARKETPLACE_HOST: &str = "amazon";
const PROXY_PREFIX: &str = "socks5://";
const WISHLIST_QUERY: &str = "reveal=unpurchased&sort=date&layout=standard&viewType=list&filter=DEFAULT&type=wishlist";

/// An Amazon wishlist and the pages visited while scraping it.
#[derive(Debug, Clone)]
pub struct Wishlist {
    id: String,
    urls: Vec<String>,
    config: WishlistConfig,
}

impl Wishlist {
    /// Builds a wishlist from a URL such as
    /// `https://www.amazon.com/hz/wishlist/ls/3I6EQPZ8OB1DT`.
    pub fn from_url(url: &str) -> Result<Self, WishlistError> {
        Self::from_url_with_config(url, WishlistConfig::default())
    }

    pub fn from_url_with_config(url: &str, config: WishlistConfig) -> Result<Self, WishlistError> {
        let id = wishlist_id_from_url(url)?;
        Self::from_id_with_config(&id, config)
    }

    /// Accepts either form a user is likely to paste. Anything with a path
    /// separator or scheme is validated as a URL, everything else as an ID.
    pub fn from_url_or_id_with_config(input: &str, config: WishlistConfig) -> Result<Self, WishlistError> {
        let input = input.trim();
        if input.contains('/') || input.contains(':') {
            Self::from_url_with_config(input, config)
        } else {
            Self::from_id_with_config(input, config)
        }
    }

    pub fn from_id(id: &str) -> Result<Self, WishlistError> {
        Self::from_id_with_config(id, WishlistConfig::default())
    }

    pub fn from_id_with_config(id: &str, config: WishlistConfig) -> Result<Self, WishlistError> {
        if id.is_empty() {
            return Err(WishlistError::EmptyId(id.to_string()));
        }
        if id.contains(['/', '?', '#']) {
            return Err(WishlistError::InvalidId(id.to_string()));
        }

        let start_url = start_url(&config.base_url, id)?;
        Ok(Self {
            id: id.to_string(),
            urls: vec![start_url.to_string()],
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The start page followed by every "see more" page discovered so far.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn config(&self) -> &WishlistConfig {
        &self.config
    }

    /// Proxies to rotate through, useful when Amazon starts showing the robot check.
    /// Bare `host:port` entries are treated as SOCKS5.
    pub fn set_proxy_urls<I, S>(&mut self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.proxy_urls = urls
            .into_iter()
            .map(Into::into)
            .map(|url| {
                if url.starts_with(PROXY_PREFIX) {
                    url
                } else {
                    format!("{PROXY_PREFIX}{url}")
                }
            })
            .collect();
    }

    /// Scrapes every page of the wishlist over HTTP.
    pub async fn items(&mut self) -> Result<ItemMap, WishlistError> {
        let fetcher = Arc::new(HttpFetcher::new(&self.config)?);
        self.items_with(fetcher).await
    }

    /// Scrapes every page of the wishlist with the given fetcher.
    pub async fn items_with<F>(&mut self, fetcher: Arc<F>) -> Result<ItemMap, WishlistError>
    where
        F: FetchPage + 'static,
    {
        let selectors = Arc::new(PageSelectors::new()?);
        let deadline = self.config.deadline;
        match deadline {
            Some(deadline) => timeout(deadline, self.crawl(fetcher, selectors))
                .await
                .map_err(|_| WishlistError::Timeout(deadline))?,
            None => self.crawl(fetcher, selectors).await,
        }
    }

    async fn crawl<F>(&mut self, fetcher: Arc<F>, selectors: Arc<PageSelectors>) -> Result<ItemMap, WishlistError>
    where
        F: FetchPage + 'static,
    {
        let start = Url::parse(&self.urls[0]).map_err(|source| WishlistError::InvalidUrl {
            url: self.urls[0].clone(),
            source,
        })?;
        self.urls.truncate(1);
        info!(url = %start, "Using URL");

        let mut items = ItemMap::new();
        let mut visited = HashSet::from([start.clone()]);
        let mut pages = JoinSet::new();
        pages.spawn(visit_page(fetcher.clone(), selectors.clone(), start, self.debug_html_path(1)));

        while let Some(joined) = pages.join_next().await {
            let PageExtract { items: found, next_page } = joined??;
            debug!(count = found.len(), "extracted items");
            for item in found {
                accumulate(&mut items, item);
            }

            let Some(next_page) = next_page else {
                continue;
            };
            if !visited.insert(next_page.clone()) {
                debug!(url = %next_page, "next page already visited");
                continue;
            }
            if visited.len() > self.config.max_pages {
                warn!(max_pages = self.config.max_pages, url = %next_page, "page limit reached, not following");
                continue;
            }

            info!(url = %next_page, "Found URL to next page");
            self.urls.push(next_page.to_string());
            let save_as = self.debug_html_path(self.urls.len());
            pages.spawn(visit_page(fetcher.clone(), selectors.clone(), next_page, save_as));
        }

        info!(wishlist = %self.id, items = items.len(), pages = self.urls.len(), "finished wishlist");
        Ok(items)
    }

    fn debug_html_path(&self, ordinal: usize) -> Option<PathBuf> {
        self.config
            .debug_html_dir
            .as_ref()
            .map(|dir| dir.join(format!("wishlist-{}-{}.html", self.id, ordinal)))
    }
}

async fn visit_page<F>(
    fetcher: Arc<F>,
    selectors: Arc<PageSelectors>,
    url: Url,
    save_as: Option<PathBuf>,
) -> Result<PageExtract, WishlistError>
where
    F: FetchPage + 'static,
{
    let page = fetcher.fetch(&url).await?;
    debug!(%url, status = page.status, from_cache = page.from_cache, "fetched page");

    if parser::is_robot_check(&page.body) {
        return Err(WishlistError::Blocked { url: url.to_string() });
    }
    if !page.is_success() {
        return Err(WishlistError::HttpStatus {
            url: url.to_string(),
            status: page.status,
        });
    }

    if let Some(path) = save_as {
        info!(path = %path.display(), "Saving wishlist HTML source");
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|err| WishlistError::io(dir, err))?;
        }
        tokio::fs::write(&path, &page.body)
            .await
            .map_err(|err| WishlistError::io(path, err))?;
    }

    Ok(parser::extract_page(&page.body, &page.url, &selectors))
}

impl fmt::Display for Wishlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.urls.join(", "))
    }
}

fn wishlist_id_from_url(url: &str) -> Result<String, WishlistError> {
    let uri = match Url::parse(url) {
        Ok(uri) => uri,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Err(WishlistError::NotAbsolute(url.to_string()));
        }
        Err(source) => {
            return Err(WishlistError::InvalidUrl {
                url: url.to_string(),
                source,
            });
        }
    };

    let is_marketplace = uri
        .host_str()
        .is_some_and(|host| host.to_lowercase().contains(MARKETPLACE_HOST));
    if !is_marketplace {
        return Err(WishlistError::NotMarketplace(url.to_string()));
    }

    let id = uri.path().rsplit('/').next().unwrap_or_default();
    if id.is_empty() {
        return Err(WishlistError::EmptyId(id.to_string()));
    }
    Ok(id.to_string())
}

fn start_url(base_url: &str, id: &str) -> Result<Url, WishlistError> {
    let raw = format!(
        "{}/hz/wishlist/ls/{}?{}",
        base_url.trim_end_matches('/'),
        id,
        WISHLIST_QUERY
    );
    Url::parse(&raw).map_err(|source| WishlistError::InvalidUrl { url: raw, source })
}
