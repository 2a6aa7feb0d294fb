//! Queue module for tracking crawl items
//!
//! This module holds the queue backends the crawl engine pulls work from:
//! - The `QueueBackend` contract (add, claim, end, release)
//! - An in-memory backend for single-process crawls
//! - A SQLite backend whose database file can be shared between processes
//!
//! Every backend deduplicates by canonical URI and hands each pending item
//! to exactly one caller.

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryQueue;
pub use sqlite::{SqliteQueue, SqliteQueueOptions};
pub use traits::{QueueBackend, QueueError, QueueResult};

use crate::config::{QueueBackendKind, QueueConfig};
use crate::state::ItemState;
use crate::CrawlError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// One queue-tracked location with its processing state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Canonical absolute URI (queue identity)
    pub uri: String,

    /// Claimed by a worker
    pub processing: bool,

    /// Processed, successfully or not
    pub completed: bool,

    /// Failure recorded when the item was ended
    pub error: Option<String>,
}

impl QueueItem {
    /// Creates a new pending item
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            processing: false,
            completed: false,
            error: None,
        }
    }

    /// Returns the lifecycle state derived from the flags
    pub fn state(&self) -> ItemState {
        ItemState::from_flags(self.processing, self.completed)
    }

    /// Moves the item to `state`, updating both flags
    pub fn set_state(&mut self, state: ItemState) {
        let (processing, completed) = state.to_flags();
        self.processing = processing;
        self.completed = completed;
    }
}

/// Item counts by state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,

    /// Completed items that recorded an error (subset of `completed`)
    pub failed: u64,
}

impl QueueStats {
    /// Total number of items ever added
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed
    }
}

/// Opens the queue backend described by the configuration
///
/// # Arguments
///
/// * `config` - The queue section of the configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn QueueBackend>)` - Ready to hand to a crawler
/// * `Err(CrawlError)` - The SQLite database could not be opened
pub fn open_queue(config: &QueueConfig) -> Result<Arc<dyn QueueBackend>, CrawlError> {
    match config.backend {
        QueueBackendKind::Memory => Ok(Arc::new(MemoryQueue::new())),
        QueueBackendKind::Sqlite => {
            let path = config.path.as_deref().ok_or_else(|| {
                CrawlError::Config(crate::ConfigError::Validation(
                    "sqlite queue requires a path".to_string(),
                ))
            })?;

            let options = SqliteQueueOptions {
                get_interval: Duration::from_millis(config.get_interval),
                max_get_attempts: config.max_get_attempts,
            };

            let queue = SqliteQueue::open(Path::new(path), options)?;
            Ok(Arc::new(queue))
        }
    }
}
