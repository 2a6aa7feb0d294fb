use crate::crawler::fetcher::{FetchedPage, RequestInfo, ResponseInfo};
use crate::crawler::parser::ParsedPage;
use crate::queue::QueueItem;
use url::Url;

/// Everything known about one fetched item
///
/// Created after a successful fetch, passed by reference through the
/// middleware pipeline and then dropped.
#[derive(Debug, Clone)]
pub struct Document {
    pub request: RequestInfo,
    pub response: ResponseInfo,
    pub body: String,
    pub title: Option<String>,

    /// Raw link candidates found in the body
    pub links: Vec<String>,

    /// The queue item as it was ended
    pub item: QueueItem,
}

impl Document {
    pub fn new(page: FetchedPage, parsed: ParsedPage, item: QueueItem) -> Self {
        Self {
            request: page.request,
            response: page.response,
            body: page.body,
            title: parsed.title,
            links: parsed.links,
            item,
        }
    }

    /// The requested location
    pub fn uri(&self) -> &Url {
        &self.request.uri
    }

    /// Looks up a request parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.params.get(name).map(String::as_str)
    }
}
