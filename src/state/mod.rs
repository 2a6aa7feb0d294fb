//! State module for tracking crawl progress
//!
//! This module provides the state machines used during a crawl.
//!
//! # Components
//!
//! - `CrawlState`: Lifecycle of a crawl engine (idle, running, paused, aborted, completed)
//! - `ItemState`: Lifecycle of a single queue item (pending, processing, completed)

mod crawl_state;
mod item_state;

// Re-export main types
pub use crawl_state::CrawlState;
pub use item_state::ItemState;
