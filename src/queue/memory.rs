//! In-memory queue backend
//!
//! Items live in an ordered list guarded by a mutex, with an index doubling
//! as the seen-set. Suitable for single-process crawls only.

use crate::queue::traits::{QueueBackend, QueueError, QueueResult};
use crate::queue::{QueueItem, QueueStats};
use crate::state::ItemState;
use crate::url::normalize_uri;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// In-memory queue backend
#[derive(Debug, Default)]
pub struct MemoryQueue {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Items in insertion order
    items: Vec<QueueItem>,

    /// URI -> position in `items`
    index: HashMap<String, usize>,

    /// Positions of pending items, oldest first
    pending: VecDeque<usize>,
}

impl MemoryQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, MemoryState>> {
        self.inner.lock().map_err(|_| QueueError::Poisoned)
    }
}

impl MemoryState {
    fn claimed_position(&self, uri: &str) -> QueueResult<usize> {
        let position = *self
            .index
            .get(uri)
            .ok_or_else(|| QueueError::NotFound(uri.to_string()))?;

        if self.items[position].state() != ItemState::Processing {
            return Err(QueueError::NotClaimed(uri.to_string()));
        }

        Ok(position)
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn add(&self, uri: &str) -> QueueResult<Option<QueueItem>> {
        let uri = normalize_uri(uri)?;
        let mut state = self.lock()?;

        if state.index.contains_key(&uri) {
            tracing::trace!("Already queued: {}", uri);
            return Ok(None);
        }

        let item = QueueItem::new(uri.clone());
        let position = state.items.len();
        state.items.push(item.clone());
        state.index.insert(uri, position);
        state.pending.push_back(position);

        Ok(Some(item))
    }

    async fn get(&self) -> QueueResult<Option<QueueItem>> {
        let mut state = self.lock()?;

        while let Some(position) = state.pending.pop_front() {
            let item = &mut state.items[position];
            if !item.state().is_claimable() {
                continue;
            }

            item.set_state(ItemState::Processing);
            return Ok(Some(item.clone()));
        }

        Ok(None)
    }

    async fn end(&self, item: &QueueItem, error: Option<&str>) -> QueueResult<QueueItem> {
        let mut state = self.lock()?;
        let position = state.claimed_position(&item.uri)?;

        let stored = &mut state.items[position];
        stored.set_state(ItemState::Completed);
        stored.error = error.map(str::to_string);

        Ok(stored.clone())
    }

    async fn release(&self, item: &QueueItem) -> QueueResult<QueueItem> {
        let mut state = self.lock()?;
        let position = state.claimed_position(&item.uri)?;

        state.items[position].set_state(ItemState::Pending);
        state.pending.push_front(position);

        Ok(state.items[position].clone())
    }

    async fn item(&self, uri: &str) -> QueueResult<Option<QueueItem>> {
        let uri = normalize_uri(uri)?;
        let state = self.lock()?;

        Ok(state
            .index
            .get(&uri)
            .map(|&position| state.items[position].clone()))
    }

    async fn stats(&self) -> QueueResult<QueueStats> {
        let state = self.lock()?;
        let mut stats = QueueStats::default();

        for item in &state.items {
            match item.state() {
                ItemState::Completed => {
                    stats.completed += 1;
                    if item.error.is_some() {
                        stats.failed += 1;
                    }
                }
                ItemState::Processing => stats.processing += 1,
                ItemState::Pending => stats.pending += 1,
            }
        }

        Ok(stats)
    }
}
