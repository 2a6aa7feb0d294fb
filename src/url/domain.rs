use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use flexcrawl::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks a URL's host against a domain allow-list
///
/// An empty allow-list admits every host. Otherwise the host must be listed
/// exactly: `example.com` does not admit `www.example.com`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use flexcrawl::url::is_domain_allowed;
///
/// let domains = vec!["example.com".to_string()];
/// assert!(is_domain_allowed(&Url::parse("http://example.com/a").unwrap(), &domains));
/// assert!(!is_domain_allowed(&Url::parse("http://cdn.example.com/a").unwrap(), &domains));
/// assert!(is_domain_allowed(&Url::parse("http://other.com/").unwrap(), &[]));
/// ```
pub fn is_domain_allowed(url: &Url, domains: &[String]) -> bool {
    if domains.is_empty() {
        return true;
    }

    match extract_domain(url) {
        Some(host) => domains.iter().any(|domain| domain.eq_ignore_ascii_case(&host)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains(list: &[&str]) -> Vec<String> {
        list.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_empty_list_allows_everything() {
        let url = Url::parse("http://anything.org/x").unwrap();
        assert!(is_domain_allowed(&url, &[]));
    }

    #[test]
    fn test_exact_match_only() {
        let allowed = domains(&["example.com"]);

        assert!(is_domain_allowed(
            &Url::parse("http://example.com/x").unwrap(),
            &allowed
        ));
        assert!(!is_domain_allowed(
            &Url::parse("http://other.com/x").unwrap(),
            &allowed
        ));
        assert!(!is_domain_allowed(
            &Url::parse("http://sub.example.com/x").unwrap(),
            &allowed
        ));
        assert!(!is_domain_allowed(
            &Url::parse("http://myexample.com/x").unwrap(),
            &allowed
        ));
    }

    #[test]
    fn test_port_does_not_matter() {
        let allowed = domains(&["127.0.0.1"]);
        assert!(is_domain_allowed(
            &Url::parse("http://127.0.0.1:4321/page").unwrap(),
            &allowed
        ));
    }

    #[test]
    fn test_allow_list_case_insensitive() {
        let allowed = domains(&["Example.COM"]);
        assert!(is_domain_allowed(
            &Url::parse("http://example.com/").unwrap(),
            &allowed
        ));
    }
}
