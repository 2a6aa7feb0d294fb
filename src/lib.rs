//! Flexcrawl: a programmable web crawler
//!
//! This crate implements a crawl engine that fetches documents, discovers
//! outbound links, filters them against a domain allow-list and feeds them
//! back into a pluggable work queue. Fetched documents are passed through an
//! ordered middleware pipeline, including a pattern router.

pub mod config;
pub mod crawler;
pub mod middleware;
pub mod queue;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue storage error: {0}")]
    Storage(#[from] queue::QueueError),

    #[error("HTTP error for {url}: {source}")]
    Fetch { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Content type header is missing for {url}")]
    MissingContentType { url: String },

    #[error("Unsupported content type {content_type} for {url}")]
    UnsupportedContentType { url: String, content_type: String },

    #[error("Location is not allowed: {location}")]
    NavigationRejected { location: String },

    #[error("Invalid location: {0}")]
    Url(#[from] UrlError),

    #[error("Middleware aborted processing of {url}: {message}")]
    Pipeline { url: String, message: String },

    #[error("Invalid route pattern {pattern}: {source}")]
    InvalidRoute {
        pattern: String,
        source: regex::Error,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`CrawlError`]
///
/// Front ends use this to decide which errors are worth surfacing; rejected
/// navigations and content-type mismatches are routine during a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Storage,
    Fetch,
    ContentType,
    NavigationRejected,
    Pipeline,
    Config,
}

impl CrawlError {
    /// Returns the category this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) => ErrorKind::Storage,
            Self::Fetch { .. } | Self::Timeout { .. } | Self::Reqwest(_) | Self::Io(_) => {
                ErrorKind::Fetch
            }
            Self::MissingContentType { .. } | Self::UnsupportedContentType { .. } => {
                ErrorKind::ContentType
            }
            Self::NavigationRejected { .. } | Self::Url(_) => ErrorKind::NavigationRejected,
            Self::Pipeline { .. } => ErrorKind::Pipeline,
            Self::Config(_) | Self::InvalidRoute { .. } => ErrorKind::Config,
        }
    }

    /// Returns true for errors that are expected in normal crawls
    pub fn is_routine(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NavigationRejected | ErrorKind::ContentType
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Empty location")]
    Empty,
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, CrawlerConfig};
pub use crawler::{CrawlEvent, Crawler, Document};
pub use middleware::Middleware;
pub use queue::{MemoryQueue, QueueBackend, QueueItem, SqliteQueue};
pub use state::{CrawlState, ItemState};
pub use crate::url::{is_domain_allowed, normalize_uri, resolve_location};
