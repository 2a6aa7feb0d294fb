//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building one HTTP client from the crawler configuration
//! - Rejecting responses that are not markup before reading the body
//! - Decoding the body with the configured fallback charset
//! - Error classification (timeout vs. other transport failures)

use crate::config::{AuthConfig, CrawlerConfig};
use crate::{ConfigError, CrawlError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, Proxy, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// What was asked for
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// The requested location
    pub uri: Url,

    /// Parameters filled in by middleware (query string, route placeholders)
    pub params: HashMap<String, String>,
}

/// What came back
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    pub status: StatusCode,

    /// Final URL after redirects
    pub final_url: Url,

    pub headers: HeaderMap,

    /// Content-Type header value
    pub content_type: String,
}

/// Result of one successful fetch
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub request: RequestInfo,
    pub response: ResponseInfo,

    /// Decoded body
    pub body: String,
}

/// Performs one HTTP retrieval
///
/// The engine only talks to the network through this trait, so tests can
/// substitute canned pages.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`, failing with a content-type error when the response is
    /// not crawlable markup
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, CrawlError>;
}

/// Builds an HTTP client with the configured transport options
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(CrawlError)` - A header, the proxy or the client itself was invalid
///
/// # Example
///
/// ```no_run
/// use flexcrawl::config::CrawlerConfig;
/// use flexcrawl::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, CrawlError> {
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("flexcrawl/{}", env!("CARGO_PKG_VERSION")));

    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::Validation(format!("Invalid header name '{}': {}", name, e))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            ConfigError::Validation(format!("Invalid header value for '{}': {}", name, e))
        })?;
        headers.insert(name, value);
    }

    let redirect = if config.follow_redirect {
        Policy::limited(config.max_redirects)
    } else {
        Policy::none()
    };

    let mut builder = Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .redirect(redirect)
        .cookie_store(config.cookies)
        .gzip(true)
        .brotli(true);

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(Duration::from_millis(timeout));
    }

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    }

    Ok(builder.build()?)
}

/// Returns true for content types the link extractor can handle
pub fn is_crawlable(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("html")
}

/// Reqwest-backed fetcher
pub struct HttpFetcher {
    client: Client,
    auth: Option<AuthConfig>,
    encoding: String,
}

impl HttpFetcher {
    /// Builds a fetcher and its client from configuration
    pub fn new(config: &CrawlerConfig) -> Result<Self, CrawlError> {
        let client = build_http_client(config)?;
        Ok(Self::with_client(client, config))
    }

    /// Wraps an existing client, taking auth and encoding from configuration
    pub fn with_client(client: Client, config: &CrawlerConfig) -> Self {
        Self {
            client,
            auth: config.auth.clone(),
            encoding: config
                .encoding
                .clone()
                .unwrap_or_else(|| "utf-8".to_string()),
        }
    }
}

fn transport_error(url: &Url, error: reqwest::Error) -> CrawlError {
    if error.is_timeout() {
        CrawlError::Timeout {
            url: url.to_string(),
        }
    } else {
        CrawlError::Fetch {
            url: url.to_string(),
            source: error,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, CrawlError> {
        let mut request = self.client.get(url.clone());
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.user, auth.pass.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        // Returning early drops the response, which abandons the body
        let content_type = match response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            Some(ct) => ct.to_string(),
            None => {
                return Err(CrawlError::MissingContentType {
                    url: url.to_string(),
                })
            }
        };

        if !is_crawlable(&content_type) {
            return Err(CrawlError::UnsupportedContentType {
                url: url.to_string(),
                content_type,
            });
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        if !status.is_success() {
            tracing::debug!("{} answered with status {}", url, status);
        }

        // A declared charset wins over the configured fallback
        let body = response
            .text_with_charset(&self.encoding)
            .await
            .map_err(|e| transport_error(url, e))?;

        Ok(FetchedPage {
            request: RequestInfo {
                uri: url.clone(),
                params: HashMap::new(),
            },
            response: ResponseInfo {
                status,
                final_url,
                headers,
                content_type,
            },
            body,
        })
    }
}
