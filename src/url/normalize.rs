use crate::UrlError;
use url::Url;

/// Resolves a raw location into an absolute HTTP(S) URL
///
/// # Resolution Rules
///
/// 1. Locations carrying a scheme are parsed as-is
/// 2. With a base document, everything else is resolved against it using
///    standard reference resolution (`//host/path`, `/path`, `path`, `?q`)
/// 3. Without a base, `//host/path` and bare `host/path` get `http` as scheme
/// 4. Only `http` and `https` are accepted
/// 5. The fragment is dropped
///
/// # Arguments
///
/// * `location` - The raw location (href attribute, seed, ...)
/// * `base` - The URL of the document the location was found in, if any
///
/// # Returns
///
/// * `Ok(Url)` - The absolute URL
/// * `Err(UrlError)` - The location cannot be resolved or is not HTTP
///
/// # Examples
///
/// ```
/// use flexcrawl::url::resolve_location;
/// use url::Url;
///
/// let base = Url::parse("http://example.com/a/b").unwrap();
/// let url = resolve_location("/relative", Some(&base)).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/relative");
///
/// let url = resolve_location("example.com/page", None).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/page");
/// ```
pub fn resolve_location(location: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let location = location.trim();
    if location.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = if has_scheme(location) {
        Url::parse(location)
    } else if let Some(base) = base {
        base.join(location)
    } else if location.starts_with("//") {
        Url::parse(&format!("http:{}", location))
    } else if location.starts_with('/') {
        return Err(UrlError::MissingDomain);
    } else {
        Url::parse(&format!("http://{}", location))
    };

    let mut url = parsed.map_err(|e| UrlError::Parse(format!("{}: {}", location, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Produces the canonical string form used as queue identity
///
/// The fragment is removed and a trailing path separator is stripped, so
/// `http://example.com/` and `http://example.com` are the same item.
pub fn canonical_string(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        url.set_path(if trimmed.is_empty() { "/" } else { trimmed });
    }

    let mut canonical = url.to_string();
    if url.path() == "/" && url.query().is_none() {
        canonical.pop();
    }
    canonical
}

/// Normalizes an absolute URI string into its canonical queue identity
///
/// # Examples
///
/// ```
/// use flexcrawl::url::normalize_uri;
///
/// assert_eq!(normalize_uri("http://EXAMPLE.com/page/#top").unwrap(), "http://example.com/page");
/// assert_eq!(normalize_uri("example.com").unwrap(), "http://example.com");
/// ```
pub fn normalize_uri(uri: &str) -> Result<String, UrlError> {
    resolve_location(uri, None).map(|url| canonical_string(&url))
}

/// Checks whether a location starts with a URI scheme
///
/// `host:port/path` is not mistaken for a scheme: a prefix containing a dot
/// or followed by a digit is treated as a host.
fn has_scheme(location: &str) -> bool {
    let Some(colon) = location.find(':') else {
        return false;
    };

    let (prefix, rest) = (&location[..colon], &location[colon + 1..]);
    let mut chars = prefix.chars();
    let valid_scheme = chars.next().map_or(false, |c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    if !valid_scheme {
        return false;
    }

    if rest.starts_with("//") {
        return true;
    }

    !prefix.contains('.') && !rest.starts_with(|c: char| c.is_ascii_digit())
}
