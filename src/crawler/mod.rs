//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the `Fetcher` trait
//! - HTML parsing and link extraction
//! - The crawl engine (scheduling, backpressure, lifecycle)
//! - Events emitted while crawling

mod document;
mod engine;
mod events;
mod fetcher;
mod parser;

#[cfg(test)]
pub(crate) mod stub;

pub use document::Document;
pub use engine::Crawler;
pub use events::CrawlEvent;
pub use fetcher::{
    build_http_client, is_crawlable, FetchedPage, Fetcher, HttpFetcher, RequestInfo, ResponseInfo,
};
pub use parser::{parse_html, ParsedPage};
