//! Pattern router
//!
//! Patterns are matched against the document's request URI with its query
//! removed:
//! - `*` alone matches everything
//! - `*` inside a pattern matches any run of characters, across segments
//! - `:name` matches one segment and is captured into the request params
//! - a pattern without `scheme://host` matches on any host, so `/users/:id`
//!   behaves like `*/users/:id`
//!
//! Every matching route runs, in registration order.

use crate::crawler::{Crawler, Document};
use crate::middleware::Middleware;
use crate::CrawlError;
use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Callback invoked for a matching document
pub type RouteHandler = Arc<dyn Fn(&Crawler, &Document) -> anyhow::Result<()> + Send + Sync>;

/// A compiled route pattern
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    pattern: String,
    regex: Regex,

    /// Name per capture group; `None` for bare wildcards
    placeholders: Vec<Option<String>>,
}

impl RouteMatcher {
    /// Compiles a route pattern
    ///
    /// # Example
    ///
    /// ```
    /// use flexcrawl::middleware::RouteMatcher;
    ///
    /// let matcher = RouteMatcher::compile("/users/:id").unwrap();
    /// let params = matcher.matches("http://example.com/users/42?tab=posts").unwrap();
    /// assert_eq!(params.get("id").map(String::as_str), Some("42"));
    /// ```
    pub fn compile(pattern: &str) -> Result<Self, CrawlError> {
        let invalid = |source| CrawlError::InvalidRoute {
            pattern: pattern.to_string(),
            source,
        };

        if pattern == "*" {
            return Ok(Self {
                pattern: pattern.to_string(),
                regex: Regex::new("^.*$").map_err(invalid)?,
                placeholders: Vec::new(),
            });
        }

        let mut source = pattern.to_string();
        if !pattern.contains("://") {
            if !source.starts_with('/') {
                source.insert(0, '/');
            }
            source.insert(0, '*');
        }

        let tokens = Regex::new(r"([:*])([A-Za-z_][\w\-]*)?").map_err(invalid)?;
        let mut expression = String::from("^");
        let mut placeholders = Vec::new();
        let mut last = 0;

        for caps in tokens.captures_iter(&source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let name = caps.get(2).map(|m| m.as_str().to_string());

            // A colon without a name (scheme separator, port) is literal
            if &caps[1] == ":" && name.is_none() {
                continue;
            }

            expression.push_str(&regex::escape(&source[last..whole.start()]));
            expression.push_str(if &caps[1] == "*" {
                "(.*?)"
            } else {
                "([^/#?]*)"
            });
            placeholders.push(name);
            last = whole.end();
        }

        expression.push_str(&regex::escape(&source[last..]));
        expression.push('$');

        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(&expression).map_err(invalid)?,
            placeholders,
        })
    }

    /// Wraps a ready-made regular expression
    ///
    /// The expression is matched against the URI with its query removed.
    /// Its capture groups do not populate any params.
    pub fn from_regex(regex: Regex) -> Self {
        Self {
            pattern: regex.as_str().to_string(),
            regex,
            placeholders: Vec::new(),
        }
    }

    /// The pattern as registered
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Matches a location, returning captured placeholders on success
    pub fn matches(&self, location: &str) -> Option<HashMap<String, String>> {
        let location = match location.find('?') {
            Some(index) => &location[..index],
            None => location,
        };

        let caps = self.regex.captures(location)?;

        let mut params = HashMap::new();
        for (index, name) in self.placeholders.iter().enumerate() {
            if let (Some(name), Some(value)) = (name, caps.get(index + 1)) {
                params.insert(name.clone(), value.as_str().to_string());
            }
        }

        Some(params)
    }
}

struct Route {
    matcher: RouteMatcher,
    handler: RouteHandler,
}

/// Middleware dispatching documents to pattern handlers
#[derive(Default)]
pub struct Router {
    routes: RwLock<Vec<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a pattern
    pub fn add_route<F>(&self, pattern: &str, handler: F) -> Result<(), CrawlError>
    where
        F: Fn(&Crawler, &Document) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.push(RouteMatcher::compile(pattern)?, Arc::new(handler));
        Ok(())
    }

    /// Registers a handler for a regular expression
    pub fn add_route_regex<F>(&self, regex: Regex, handler: F)
    where
        F: Fn(&Crawler, &Document) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.push(RouteMatcher::from_regex(regex), Arc::new(handler));
    }

    fn push(&self, matcher: RouteMatcher, handler: RouteHandler) {
        tracing::debug!("Registered route {}", matcher.pattern());

        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Route { matcher, handler });
    }
}

#[async_trait]
impl Middleware for Router {
    fn name(&self) -> &str {
        "router"
    }

    async fn process(&self, crawler: &Crawler, document: &mut Document) -> anyhow::Result<()> {
        let location = document.request.uri.to_string();

        let matched: Vec<(String, HashMap<String, String>, RouteHandler)> = self
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|route| {
                route.matcher.matches(&location).map(|params| {
                    (
                        route.matcher.pattern().to_string(),
                        params,
                        Arc::clone(&route.handler),
                    )
                })
            })
            .collect();

        for (pattern, params, handler) in matched {
            document.request.params.extend(params);
            handler(crawler, document).with_context(|| format!("route {}", pattern))?;
        }

        Ok(())
    }
}
