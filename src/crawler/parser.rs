//! HTML parser for extracting links and metadata
//!
//! Every element carrying an `href` attribute is a link candidate (`<a>`,
//! `<link>`, `<area>`, `<base>`...). Candidates are returned raw; resolving
//! and filtering them is navigation's job.

use scraper::{Html, Selector};

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Raw href values in document order
    pub links: Vec<String>,
}

/// Parses HTML content and extracts link candidates and the title
///
/// Empty and fragment-only hrefs (same page anchors) are dropped.
///
/// # Example
///
/// ```
/// use flexcrawl::crawler::parse_html;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let parsed = parse_html(html);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["/page".to_string()]);
/// ```
pub fn parse_html(html: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("[href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                let href = href.trim();
                if href.is_empty() || href.starts_with('#') {
                    continue;
                }
                links.push(href.to_string());
            }
        }
    }

    links
}
