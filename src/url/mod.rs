//! URL handling module
//!
//! This module provides location resolution, canonical queue identities and
//! domain allow-list filtering. Together these make up the pure part of
//! navigating to a discovered location.

mod domain;
mod normalize;

use crate::CrawlError;
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, is_domain_allowed};
pub use normalize::{canonical_string, normalize_uri, resolve_location};

/// Resolves, normalizes and filters a location
///
/// This is everything navigation does before handing the location to the
/// queue:
/// 1. Resolve against the originating document (or assume `http`)
/// 2. Reject non-HTTP schemes
/// 3. Reject hosts missing from a non-empty allow-list
/// 4. Produce the canonical string identity
///
/// # Arguments
///
/// * `location` - The raw location
/// * `base` - The URL of the originating document, if any
/// * `domains` - The domain allow-list (empty = unrestricted)
///
/// # Returns
///
/// * `Ok(String)` - Canonical URI ready for the queue
/// * `Err(CrawlError::Url)` - The location could not be resolved
/// * `Err(CrawlError::NavigationRejected)` - The host is not allowed
pub fn filter_location(
    location: &str,
    base: Option<&Url>,
    domains: &[String],
) -> Result<String, CrawlError> {
    let url = resolve_location(location, base)?;

    if !is_domain_allowed(&url, domains) {
        return Err(CrawlError::NavigationRejected {
            location: url.to_string(),
        });
    }

    Ok(canonical_string(&url))
}
