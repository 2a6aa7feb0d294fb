//! Document middleware
//!
//! Every fetched document runs through an ordered pipeline of middleware.
//! Each one may enrich the document or stop the chain by returning an error,
//! which the crawler reports as a pipeline error for that document.
//!
//! Two middlewares are built in:
//! - `QueryString` copies the request URI's query into the request params
//! - `Router` dispatches documents to handlers registered by pattern

mod querystring;
mod router;

pub use querystring::QueryString;
pub use router::{RouteHandler, RouteMatcher, Router};

use crate::crawler::{Crawler, Document};
use async_trait::async_trait;

/// One step of the document pipeline
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Short name used in logs and pipeline errors
    fn name(&self) -> &str;

    /// Processes a document
    ///
    /// Returning `Ok(())` passes control to the next middleware; an error
    /// aborts the pipeline for this document.
    async fn process(&self, crawler: &Crawler, document: &mut Document) -> anyhow::Result<()>;
}
