//! Crawl engine - lifecycle and scheduling
//!
//! The engine pulls items from a queue backend and hands them to a bounded
//! pool of workers. Each worker throttles, fetches, parses, navigates to the
//! discovered links, ends the item on the queue and then runs the document
//! through the middleware pipeline.
//!
//! Two limits apply:
//! - `max-crawl-queue-length` bounds how many claimed items may wait for a
//!   worker slot
//! - `max-concurrency` bounds how many items are processed at once
//!
//! Lifecycle transitions are driven by `crawl`, `pause`, `resume` and
//! `abort`, plus the drain condition (queue empty and nothing in flight).

use crate::config::{validate_crawler_config, CrawlerConfig};
use crate::crawler::events::{CrawlEvent, EventBus};
use crate::crawler::fetcher::{FetchedPage, Fetcher, HttpFetcher};
use crate::crawler::parser::{parse_html, ParsedPage};
use crate::crawler::Document;
use crate::middleware::{Middleware, QueryString, Router};
use crate::queue::{QueueBackend, QueueItem, QueueStats};
use crate::state::CrawlState;
use crate::url::filter_location;
use crate::CrawlError;
use regex::Regex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{watch, Mutex, Semaphore};
use url::Url;

/// Programmable crawler
///
/// Cheap to clone; clones share the same engine.
///
/// # Example
///
/// ```no_run
/// use flexcrawl::{Crawler, CrawlerConfig, MemoryQueue};
/// use std::sync::Arc;
///
/// # async fn example() -> flexcrawl::Result<()> {
/// let config = CrawlerConfig::default().with_url("http://example.com");
/// let crawler = Crawler::new(config, Arc::new(MemoryQueue::new()))?;
///
/// crawler.route("/posts/:id", |_, document| {
///     println!("post {:?}", document.param("id"));
///     Ok(())
/// })?;
///
/// crawler.run().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Crawler {
    inner: Arc<Inner>,
}

struct Inner {
    config: CrawlerConfig,
    domains: Vec<String>,
    queue: Arc<dyn QueueBackend>,
    fetcher: Arc<dyn Fetcher>,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    router: Arc<Router>,
    state: watch::Sender<CrawlState>,
    workers: Arc<Semaphore>,

    /// Claimed items not yet ended or released
    in_flight: AtomicUsize,

    /// Claimed items still waiting for a worker slot
    waiting: AtomicUsize,

    /// Set when the queue failed during a claim; no further claims are made
    halted: AtomicBool,

    completion_fired: AtomicBool,
    fill_lock: Mutex<()>,
    events: EventBus,
}

impl Crawler {
    /// Creates a crawler fetching over HTTP
    ///
    /// The pipeline starts with the query-string extractor followed by the
    /// router; middleware added with [`use_middleware`](Self::use_middleware)
    /// runs after them.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `queue` - The queue backend to pull work from
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - An idle crawler
    /// * `Err(CrawlError)` - Invalid configuration or HTTP client
    pub fn new(config: CrawlerConfig, queue: Arc<dyn QueueBackend>) -> Result<Self, CrawlError> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_fetcher(config, queue, Arc::new(fetcher))
    }

    /// Creates a crawler using a custom fetcher
    pub fn with_fetcher(
        config: CrawlerConfig,
        queue: Arc<dyn QueueBackend>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, CrawlError> {
        validate_crawler_config(&config)?;

        let router = Arc::new(Router::new());
        let middleware: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(QueryString) as Arc<dyn Middleware>,
            Arc::clone(&router) as Arc<dyn Middleware>,
        ];
        let (state, _) = watch::channel(CrawlState::Idle);

        Ok(Self {
            inner: Arc::new(Inner {
                domains: config.allowed_domains(),
                workers: Arc::new(Semaphore::new(config.max_concurrency)),
                config,
                queue,
                fetcher,
                middleware: RwLock::new(middleware),
                router,
                state,
                in_flight: AtomicUsize::new(0),
                waiting: AtomicUsize::new(0),
                halted: AtomicBool::new(false),
                completion_fired: AtomicBool::new(false),
                fill_lock: Mutex::new(()),
                events: EventBus::default(),
            }),
        })
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.inner.config
    }

    /// The effective domain allow-list
    pub fn domains(&self) -> &[String] {
        &self.inner.domains
    }

    pub fn queue(&self) -> &Arc<dyn QueueBackend> {
        &self.inner.queue
    }

    /// Current lifecycle state
    pub fn state(&self) -> CrawlState {
        *self.inner.state.borrow()
    }

    /// Number of claimed items not yet ended or released
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Returns a receiver for all events emitted from now on
    pub fn subscribe(&self) -> UnboundedReceiver<CrawlEvent> {
        self.inner.events.subscribe()
    }

    /// Appends a middleware to the pipeline
    pub fn use_middleware<M>(&self, middleware: M) -> &Self
    where
        M: Middleware + 'static,
    {
        tracing::debug!("Using middleware {}", middleware.name());
        self.inner
            .middleware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(middleware));
        self
    }

    /// Registers a route handler on the built-in router
    pub fn route<F>(&self, pattern: &str, handler: F) -> Result<&Self, CrawlError>
    where
        F: Fn(&Crawler, &Document) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.router.add_route(pattern, handler)?;
        Ok(self)
    }

    /// Registers a route handler matched by a regular expression
    ///
    /// Capture groups are not turned into params.
    pub fn route_regex<F>(&self, regex: Regex, handler: F) -> &Self
    where
        F: Fn(&Crawler, &Document) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.router.add_route_regex(regex, handler);
        self
    }

    /// Submits a location to the queue
    ///
    /// Relative locations are resolved as if there were no originating
    /// document (`http` is assumed).
    ///
    /// # Returns
    ///
    /// * `Ok(Some(item))` - The location was new and has been queued
    /// * `Ok(None)` - The location was already known
    /// * `Err(CrawlError)` - Rejected by the allow-list, unparseable, or the
    ///   queue failed
    pub async fn navigate(&self, location: &str) -> Result<Option<QueueItem>, CrawlError> {
        self.navigate_from(location, None).await
    }

    async fn navigate_from(
        &self,
        location: &str,
        base: Option<&Url>,
    ) -> Result<Option<QueueItem>, CrawlError> {
        let uri = filter_location(location, base, &self.inner.domains)?;
        Ok(self.inner.queue.add(&uri).await?)
    }

    /// Queue counts, for progress reporting
    pub async fn stats(&self) -> Result<QueueStats, CrawlError> {
        Ok(self.inner.queue.stats().await?)
    }

    /// Starts (or continues) claiming work
    ///
    /// From `idle` this moves the crawler to `running`. While `paused` the
    /// call waits until the crawler is resumed or aborted. Terminal states
    /// make it a no-op.
    pub async fn crawl(&self) {
        match self.state() {
            CrawlState::Idle => {
                if self.transition(CrawlState::Running) {
                    tracing::info!("Crawl started");
                }
            }
            CrawlState::Paused => {
                tracing::debug!("Crawl deferred until resume");
                let mut rx = self.inner.state.subscribe();
                let _ = rx.wait_for(|state| *state != CrawlState::Paused).await;
            }
            CrawlState::Running => {}
            CrawlState::Aborted | CrawlState::Completed => return,
        }

        self.fill().await;
    }

    /// Stops claiming new items; in-flight items still finish
    pub fn pause(&self) {
        if self.transition(CrawlState::Paused) {
            tracing::info!("Crawl paused");
            self.inner.events.emit(CrawlEvent::Paused);
        }
    }

    /// Resumes claiming after a pause
    pub async fn resume(&self) {
        if self.state() != CrawlState::Paused {
            return;
        }

        if self.transition(CrawlState::Running) {
            tracing::info!("Crawl resumed");
            self.inner.events.emit(CrawlEvent::Resumed);
            self.fill().await;
        }
    }

    /// Aborts the crawl
    ///
    /// Claimed items that have not started are released back to the queue.
    /// Items already being processed finish and are ended; the crawler
    /// completes once none remain.
    pub fn abort(&self) {
        let was_paused = self.state() == CrawlState::Paused;

        if !self.transition(CrawlState::Aborted) {
            return;
        }

        if was_paused {
            self.inner.events.emit(CrawlEvent::Resumed);
        }

        let remaining = self.in_flight();
        tracing::info!("Crawl aborted with {} item(s) in flight", remaining);

        if remaining == 0 {
            self.complete();
        }
    }

    /// Waits until the crawler reaches `completed`
    pub async fn wait(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|state| *state == CrawlState::Completed).await;
    }

    /// Navigates to the configured seed, crawls and waits for completion
    pub async fn run(&self) -> Result<(), CrawlError> {
        if let Some(seed) = self.inner.config.url.clone() {
            match self.navigate(&seed).await? {
                Some(item) => tracing::info!("Seeded queue with {}", item.uri),
                None => tracing::info!("Seed {} already queued", seed),
            }
        }

        self.crawl().await;
        self.wait().await;
        Ok(())
    }

    fn transition(&self, next: CrawlState) -> bool {
        self.inner.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                tracing::debug!("Crawler state {} -> {}", state, next);
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Fires the completion signal, at most once
    fn complete(&self) {
        if self.inner.completion_fired.swap(true, Ordering::SeqCst) {
            return;
        }

        if !self.transition(CrawlState::Completed) {
            self.inner.state.send_replace(CrawlState::Completed);
        }

        tracing::info!("Crawl complete");
        self.inner.events.emit(CrawlEvent::Complete);
    }

    fn emit_error(&self, error: CrawlError) {
        if error.is_routine() {
            tracing::debug!("{}", error);
        } else {
            tracing::warn!("{}", error);
        }
        self.inner.events.emit(CrawlEvent::Error(Arc::new(error)));
    }

    /// Claims items until the backpressure bound is hit or the queue is
    /// empty, and detects the drain condition
    fn fill(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let _guard = self.inner.fill_lock.lock().await;
            let bound = self.inner.config.max_crawl_queue_length;

            while self.state().admits_claims()
                && !self.inner.halted.load(Ordering::SeqCst)
                && self.inner.waiting.load(Ordering::SeqCst) < bound
            {
                match self.inner.queue.get().await {
                    Ok(Some(item)) => {
                        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);

                        // A polling backend may answer long after the loop
                        // condition was checked
                        if !self.state().admits_claims() {
                            self.release(&item, "claimed while not running").await;
                            self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
                            break;
                        }

                        tracing::debug!("Claimed {}", item.uri);
                        self.inner.waiting.fetch_add(1, Ordering::SeqCst);
                        tokio::spawn(self.clone().work(item));
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Queue failed while claiming, no further items will be claimed");
                        self.inner.halted.store(true, Ordering::SeqCst);
                        self.emit_error(e.into());
                        break;
                    }
                }
            }

            let state = self.state();
            if self.in_flight() == 0
                && matches!(state, CrawlState::Running | CrawlState::Aborted)
            {
                self.complete();
            }
        })
    }

    /// Worker task for one claimed item
    async fn work(self, item: QueueItem) {
        let permit = {
            let mut state = self.inner.state.subscribe();
            tokio::select! {
                permit = Arc::clone(&self.inner.workers).acquire_owned() => permit.ok(),
                _ = state.wait_for(|s| s.is_terminal()) => None,
            }
        };
        self.inner.waiting.fetch_sub(1, Ordering::SeqCst);

        if permit.is_none() || self.state().is_terminal() {
            self.release(&item, "after abort").await;
        } else {
            self.process(item).await;
        }
        drop(permit);

        let remaining = self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        if self.state().is_terminal() {
            if remaining == 0 {
                self.complete();
            }
        } else {
            self.fill().await;
        }
    }

    /// Hands a claimed but unprocessed item back to the queue
    async fn release(&self, item: &QueueItem, reason: &str) {
        match self.inner.queue.release(item).await {
            Ok(_) => tracing::debug!("Released {} {}", item.uri, reason),
            Err(e) => self.emit_error(e.into()),
        }
    }

    /// Throttle, fetch, navigate, end, then run the pipeline
    async fn process(&self, item: QueueItem) {
        tokio::time::sleep(Duration::from_millis(self.inner.config.interval)).await;

        let outcome = self.fetch_and_navigate(&item).await;
        let error = outcome.as_ref().err().map(|e| e.to_string());

        let ended = match self.inner.queue.end(&item, error.as_deref()).await {
            Ok(ended) => ended,
            Err(e) => {
                self.emit_error(e.into());
                return;
            }
        };

        let (page, parsed) = match outcome {
            Ok(fetched) => fetched,
            Err(e) => {
                self.emit_error(e);
                return;
            }
        };

        let mut document = Document::new(page, parsed, ended);
        match self.run_pipeline(&mut document).await {
            Ok(()) => {
                tracing::debug!("Processed {}", document.item.uri);
                self.inner
                    .events
                    .emit(CrawlEvent::Document(Arc::new(document)));
            }
            Err(e) => self.emit_error(e),
        }
    }

    async fn fetch_and_navigate(
        &self,
        item: &QueueItem,
    ) -> Result<(FetchedPage, ParsedPage), CrawlError> {
        let url = Url::parse(&item.uri).map_err(|e| crate::UrlError::Parse(e.to_string()))?;

        tracing::debug!("Fetching {}", url);
        let page = self.inner.fetcher.fetch(&url).await?;
        let parsed = parse_html(&page.body);

        let base = page.response.final_url.clone();
        for link in &parsed.links {
            match self.navigate_from(link, Some(&base)).await {
                Ok(Some(added)) => self.inner.events.emit(CrawlEvent::Navigated(added.uri)),
                Ok(None) => {}
                Err(e) => self.emit_error(e),
            }
        }

        Ok((page, parsed))
    }

    async fn run_pipeline(&self, document: &mut Document) -> Result<(), CrawlError> {
        let middleware = self
            .inner
            .middleware
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for step in middleware {
            step.process(self, document)
                .await
                .map_err(|e| CrawlError::Pipeline {
                    url: document.item.uri.clone(),
                    message: format!("{}: {:#}", step.name(), e),
                })?;
        }

        Ok(())
    }
}
