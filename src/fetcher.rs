use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    Jitter, Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use rand::seq::SliceRandom;
use reqwest::{Client, Proxy, header, redirect};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CachedPage, ResponseCache};
use crate::config::WishlistConfig;
use crate::error::WishlistError;
use crate::parser::is_robot_check;

const MAX_REDIRECTS: usize = 10;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Desktop browser User-Agents; one is picked at random for every request.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

/// A fetched page. `url` is where the body actually came from, after redirects.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub status: u16,
    pub body: String,
    pub from_cache: bool,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait FetchPage: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Page, WishlistError>;
}

/// Fetches wishlist pages over HTTP the way a browser in a USD locale would.
pub struct HttpFetcher {
    clients: Vec<Client>,
    next_client: AtomicUsize,
    permits: Semaphore,
    limiter: DirectRateLimiter,
    random_delay: Duration,
    cookie: String,
    cache: Option<ResponseCache>,
}

impl HttpFetcher {
    pub fn new(config: &WishlistConfig) -> Result<Self, WishlistError> {
        let clients = if config.proxy_urls.is_empty() {
            vec![build_client(config, None)?]
        } else {
            debug!(proxies = ?config.proxy_urls, "Using proxies");
            config
                .proxy_urls
                .iter()
                .map(|proxy| build_client(config, Some(proxy)))
                .collect::<Result<Vec<_>, _>>()?
        };

        let cache = config.cache_dir.as_ref().map(|dir| {
            debug!(dir = %dir.display(), "Caching Amazon responses");
            ResponseCache::new(dir)
        });

        Ok(Self {
            clients,
            next_client: AtomicUsize::new(0),
            permits: Semaphore::new(config.parallelism.max(1)),
            limiter: RateLimiter::direct(Quota::per_second(
                NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN),
            )),
            random_delay: config.random_delay,
            cookie: config.cookie.clone(),
            cache,
        })
    }

    /// Waits for a rate-limit slot plus a random extra delay of up to `random_delay`.
    async fn pace(&self) {
        self.limiter
            .until_ready_with_jitter(Jitter::up_to(self.random_delay))
            .await;
    }

    /// Round-robin over the per-proxy clients.
    fn client(&self) -> &Client {
        let index = self.next_client.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[index]
    }
}

fn build_client(config: &WishlistConfig, proxy: Option<&String>) -> Result<Client, WishlistError> {
    let mut builder = Client::builder()
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(config.request_timeout);

    if let Some(proxy_url) = proxy {
        let proxy = Proxy::all(proxy_url.as_str()).map_err(|source| WishlistError::InvalidProxy {
            url: proxy_url.clone(),
            source,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|err| WishlistError::request("<client>", err))
}

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[async_trait]
impl FetchPage for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Page, WishlistError> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(url.as_str()).await? {
                let page_url = Url::parse(&cached.url).unwrap_or_else(|err| {
                    warn!(%url, cached_url = %cached.url, error = %err, "cached URL unreadable, using requested URL");
                    url.clone()
                });
                return Ok(Page {
                    url: page_url,
                    status: 200,
                    body: cached.body,
                    from_cache: true,
                });
            }
        }

        // The semaphore is never closed, so acquire only fails if that changes.
        let _permit = self.permits.acquire().await.ok();

        self.pace().await;

        let user_agent = random_user_agent();
        debug!(%url, user_agent, "Using User-Agent");

        let response = self
            .client()
            .get(url.clone())
            .header(header::USER_AGENT, user_agent)
            .header(header::COOKIE, &self.cookie)
            .send()
            .await
            .map_err(|err| WishlistError::request(url.as_str(), err))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        debug!(%url, status, "Status");

        let body = response
            .text()
            .await
            .map_err(|err| WishlistError::request(url.as_str(), err))?;

        let page = Page {
            url: final_url,
            status,
            body,
            from_cache: false,
        };

        if let Some(cache) = &self.cache {
            if page.is_success() && !is_robot_check(&page.body) {
                let entry = CachedPage {
                    url: page.url.to_string(),
                    body: page.body.clone(),
                };
                cache.put(url.as_str(), &entry).await?;
            }
        }

        Ok(page)
    }
}
