use crate::crawler::{Crawler, Document};
use crate::middleware::Middleware;
use async_trait::async_trait;

/// Parses the request URI's query into the request params
///
/// Keys already present in the params are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryString;

#[async_trait]
impl Middleware for QueryString {
    fn name(&self) -> &str {
        "querystring"
    }

    async fn process(&self, _crawler: &Crawler, document: &mut Document) -> anyhow::Result<()> {
        let pairs: Vec<(String, String)> =
            document.request.uri.query_pairs().into_owned().collect();

        for (key, value) in pairs {
            document.request.params.entry(key).or_insert(value);
        }

        Ok(())
    }
}
