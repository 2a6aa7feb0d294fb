use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure for Flexcrawl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Top-level `[auth]` table, folded into `crawler.auth` on load
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub queue: QueueConfig,
}

/// Crawler behavior configuration
///
/// Immutable once handed to a [`Crawler`](crate::Crawler).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Seed location navigated to by `Crawler::run`
    pub url: Option<String>,

    /// Domain allow-list (exact host match)
    pub domains: Vec<String>,

    /// Delay before each fetch, per worker slot (milliseconds)
    pub interval: u64,

    /// Maximum number of fetches executing at once
    #[serde(rename = "max-concurrency")]
    pub max_concurrency: usize,

    /// Maximum number of claimed items waiting for a worker slot
    #[serde(rename = "max-crawl-queue-length")]
    pub max_crawl_queue_length: usize,

    /// Per-fetch timeout (milliseconds)
    pub timeout: Option<u64>,

    #[serde(rename = "follow-redirect")]
    pub follow_redirect: bool,

    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    /// Charset label used when the response does not declare one
    ///
    /// A `charset` parameter in the response's `Content-Type` takes
    /// precedence; this label never overrides it.
    pub encoding: Option<String>,

    pub proxy: Option<String>,

    /// Keep a cookie jar across requests
    pub cookies: bool,

    /// Extra request headers
    pub headers: HashMap<String, String>,

    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,

    pub auth: Option<AuthConfig>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            url: None,
            domains: Vec::new(),
            interval: 250,
            max_concurrency: 4,
            max_crawl_queue_length: 10,
            timeout: None,
            follow_redirect: true,
            max_redirects: 10,
            encoding: None,
            proxy: None,
            cookies: false,
            headers: HashMap::new(),
            user_agent: None,
            auth: None,
        }
    }
}

impl CrawlerConfig {
    /// Sets the seed location
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the domain allow-list
    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-slot fetch interval in milliseconds
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_max_crawl_queue_length(mut self, length: usize) -> Self {
        self.max_crawl_queue_length = length;
        self
    }

    /// Returns the effective allow-list
    ///
    /// Configured domains are lowercased. With none configured, the seed's
    /// host is the only allowed domain; with no seed either, every domain
    /// is allowed (empty list).
    pub fn allowed_domains(&self) -> Vec<String> {
        if !self.domains.is_empty() {
            return self.domains.iter().map(|d| d.to_lowercase()).collect();
        }

        self.url
            .as_deref()
            .and_then(|seed| crate::url::resolve_location(seed, None).ok())
            .and_then(|seed| crate::url::extract_domain(&seed))
            .into_iter()
            .collect()
    }
}

/// HTTP basic auth credentials
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthConfig {
    pub user: String,
    #[serde(default)]
    pub pass: Option<String>,
}

/// Queue backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackendKind {
    #[default]
    Memory,
    Sqlite,
}

/// Queue configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub backend: QueueBackendKind,

    /// Database file for the sqlite backend
    pub path: Option<String>,

    /// Delay between claim attempts on an empty shared queue (milliseconds)
    #[serde(rename = "get-interval")]
    pub get_interval: u64,

    #[serde(rename = "max-get-attempts")]
    pub max_get_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackendKind::Memory,
            path: None,
            get_interval: 250,
            max_get_attempts: 4,
        }
    }
}
