//! Crawl events
//!
//! Subscribers get an unbounded channel each. Events are delivered in the
//! order they are emitted; receivers that were dropped are forgotten on the
//! next emit.

use crate::crawler::Document;
use crate::CrawlError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Something observable that happened during a crawl
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    /// A discovered location passed navigation
    Navigated(String),

    /// A document made it through the middleware pipeline
    Document(Arc<Document>),

    Paused,
    Resumed,

    /// Emitted exactly once per crawler
    Complete,

    /// A non-fatal, per-item or per-link failure
    Error(Arc<CrawlError>),
}

#[derive(Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<UnboundedSender<CrawlEvent>>>,
}

impl EventBus {
    pub(crate) fn subscribe(&self) -> UnboundedReceiver<CrawlEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: CrawlEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
