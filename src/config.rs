use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::error::WishlistError;

pub const DEFAULT_BASE_URL: &str = "https://www.amazon.com";
pub const DEFAULT_CACHE_DIR: &str = "./cache";
pub const CURRENCY_COOKIE: &str = "i18n-prefs=USD";

/// Knobs for one scraping run.
#[derive(Debug, Clone)]
pub struct WishlistConfig {
    /// Marketplace origin the wishlist start URL is built on.
    pub base_url: String,
    /// Where responses are cached. `None` always goes to the network.
    pub cache_dir: Option<PathBuf>,
    /// When set, every fetched page is saved here as HTML.
    pub debug_html_dir: Option<PathBuf>,
    pub proxy_urls: Vec<String>,
    pub parallelism: usize,
    /// Sustained request rate across all workers.
    pub requests_per_second: u32,
    /// Upper bound of the random pause added before each network request.
    pub random_delay: Duration,
    pub request_timeout: Duration,
    /// Deadline for the whole run, all pages included.
    pub deadline: Option<Duration>,
    pub max_pages: usize,
    pub cookie: String,
}

impl Default for WishlistConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: Some(PathBuf::from(DEFAULT_CACHE_DIR)),
            debug_html_dir: None,
            proxy_urls: Vec::new(),
            parallelism: 4,
            requests_per_second: 4,
            random_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            deadline: Some(Duration::from_secs(300)),
            max_pages: 100,
            cookie: CURRENCY_COOKIE.to_string(),
        }
    }
}

impl WishlistConfig {
    /// Defaults overridden by `WISHLIST_*` environment variables.
    pub fn from_env() -> Result<Self, WishlistError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WishlistError> {
        let mut config = Self::default();

        if let Some(base_url) = lookup("WISHLIST_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(dir) = lookup("WISHLIST_CACHE_DIR") {
            let dir = dir.trim();
            config.cache_dir = if dir.is_empty() || dir.eq_ignore_ascii_case("off") {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
        if let Some(dir) = lookup("WISHLIST_DEBUG_DIR").filter(|dir| !dir.trim().is_empty()) {
            config.debug_html_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(proxies) = lookup("WISHLIST_PROXIES") {
            config.proxy_urls = proxies
                .split(',')
                .map(str::trim)
                .filter(|proxy| !proxy.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(parallelism) = lookup("WISHLIST_PARALLELISM") {
            config.parallelism = parse_var("WISHLIST_PARALLELISM", &parallelism)?;
        }
        if let Some(rate) = lookup("WISHLIST_REQUESTS_PER_SECOND") {
            config.requests_per_second = parse_var("WISHLIST_REQUESTS_PER_SECOND", &rate)?;
            if config.requests_per_second == 0 {
                return Err(WishlistError::Config(
                    "WISHLIST_REQUESTS_PER_SECOND must be at least 1".to_string(),
                ));
            }
        }
        if let Some(delay) = lookup("WISHLIST_RANDOM_DELAY_MS") {
            config.random_delay = Duration::from_millis(parse_var("WISHLIST_RANDOM_DELAY_MS", &delay)?);
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, WishlistError> {
    value
        .trim()
        .parse()
        .map_err(|_| WishlistError::Config(format!("{key} has invalid value '{value}'")))
}
