//! Canned fetcher and helpers for crawler tests

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchedPage, Fetcher, RequestInfo, ResponseInfo};
use crate::crawler::parser::ParsedPage;
use crate::crawler::{Crawler, Document};
use crate::queue::{MemoryQueue, QueueItem};
use crate::CrawlError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

enum StubPage {
    Html(String),
    ContentType(String),
}

/// Serves registered pages; unknown locations get an empty document
#[derive(Default)]
pub(crate) struct StubFetcher {
    pages: HashMap<String, StubPage>,
    gate: Option<Arc<Semaphore>>,
    started: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(key(url), StubPage::Html(html.to_string()));
        self
    }

    pub(crate) fn content_type(mut self, url: &str, content_type: &str) -> Self {
        self.pages
            .insert(key(url), StubPage::ContentType(content_type.to_string()));
        self
    }

    /// Every fetch consumes one permit from `gate` before answering
    pub(crate) fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Number of fetches that have begun
    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that were running at the same time
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

pub(crate) fn html_page(url: &Url, body: &str) -> FetchedPage {
    FetchedPage {
        request: RequestInfo {
            uri: url.clone(),
            params: HashMap::new(),
        },
        response: ResponseInfo {
            status: StatusCode::OK,
            final_url: url.clone(),
            headers: HeaderMap::new(),
            content_type: "text/html".to_string(),
        },
        body: body.to_string(),
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, CrawlError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        tokio::task::yield_now().await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        match self.pages.get(url.as_str()) {
            Some(StubPage::Html(body)) => Ok(html_page(url, body)),
            Some(StubPage::ContentType(content_type)) => Err(CrawlError::UnsupportedContentType {
                url: url.to_string(),
                content_type: content_type.clone(),
            }),
            None => Ok(html_page(url, "<html><body></body></html>")),
        }
    }
}

/// Crawler config with no throttle delay
pub(crate) fn test_config() -> CrawlerConfig {
    CrawlerConfig::default().with_interval(0)
}

/// Idle crawler over an empty memory queue and a stub fetcher
pub(crate) fn stub_crawler() -> Crawler {
    Crawler::with_fetcher(
        test_config(),
        Arc::new(MemoryQueue::new()),
        Arc::new(StubFetcher::new()),
    )
    .unwrap()
}

/// Document for `uri` with an empty body
pub(crate) fn stub_document(uri: &str) -> Document {
    let url = Url::parse(uri).unwrap();
    Document::new(
        html_page(&url, ""),
        ParsedPage::default(),
        QueueItem::new(uri),
    )
}
