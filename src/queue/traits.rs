//! Queue traits and error types
//!
//! This module defines the contract every queue backend satisfies and the
//! errors a backend may report.

use crate::queue::{QueueItem, QueueStats};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] crate::UrlError),

    #[error("Item is not claimed: {0}")]
    NotClaimed(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Queue lock poisoned")]
    Poisoned,
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Trait for queue backend implementations
///
/// The backend is the single source of truth for item state. Many workers
/// (and, for shared backends, many processes) call it concurrently, so
/// claiming must be atomic.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Adds a location to the queue
    ///
    /// The URI is normalized first. A location already seen by this queue
    /// is absorbed silently.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(QueueItem))` - A new pending item was stored
    /// * `Ok(None)` - The location was already present
    async fn add(&self, uri: &str) -> QueueResult<Option<QueueItem>>;

    /// Claims one pending item
    ///
    /// Selecting the item and marking it processing happen in one step, so
    /// two callers never receive the same item.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(QueueItem))` - The claimed item (`processing = true`)
    /// * `Ok(None)` - No pending item is available
    async fn get(&self) -> QueueResult<Option<QueueItem>>;

    /// Marks a claimed item completed, recording an optional error
    ///
    /// Must be called exactly once per claimed item. Ending an item that is
    /// not currently processing fails with `QueueError::NotClaimed` and
    /// changes nothing.
    async fn end(&self, item: &QueueItem, error: Option<&str>) -> QueueResult<QueueItem>;

    /// Returns a claimed item to the pending state without completing it
    async fn release(&self, item: &QueueItem) -> QueueResult<QueueItem>;

    /// Looks up an item by URI
    async fn item(&self, uri: &str) -> QueueResult<Option<QueueItem>>;

    /// Counts items by state
    async fn stats(&self) -> QueueResult<QueueStats>;
}
