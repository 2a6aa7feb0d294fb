//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use flexcrawl::config::{load_config, AuthConfig, CrawlerConfig};
use flexcrawl::crawler::{Fetcher, HttpFetcher};
use flexcrawl::queue::{open_queue, SqliteQueueOptions};
use flexcrawl::{CrawlEvent, CrawlState, Crawler, ErrorKind, MemoryQueue, QueueBackend, SqliteQueue};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(30);

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .expect(1)
        .mount(server)
        .await;
}

fn test_config(seed: &str) -> CrawlerConfig {
    CrawlerConfig::default()
        .with_url(seed)
        .with_interval(10)
}

fn drain(rx: &mut UnboundedReceiver<CrawlEvent>) -> Vec<CrawlEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn document_uris(events: &[CrawlEvent]) -> Vec<String> {
    let mut uris: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            CrawlEvent::Document(document) => Some(document.item.uri.clone()),
            _ => None,
        })
        .collect();
    uris.sort();
    uris
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{}/page1">Page 1</a>
            <a href="/page2">Page 2</a>
            </body></html>"#,
            base_url
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/page1",
        r#"<html><head><title>Page 1</title></head><body>
            <a href="page2">Page 2</a>
            <a href="http://other.invalid/x">Elsewhere</a>
            <a href="mailto:someone@example.com">Mail</a>
            </body></html>"#
            .to_string(),
    )
    .await;
    mount_page(
        &mock_server,
        "/page2",
        r#"<html><head><title>Page 2</title></head><body>
            <a href="/">Home</a>
            </body></html>"#
            .to_string(),
    )
    .await;

    let crawler = Crawler::new(test_config(&base_url), Arc::new(MemoryQueue::new())).unwrap();
    let mut rx = crawler.subscribe();

    let pages = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&pages);
    crawler
        .route("/page:n", move |_, document| {
            seen.lock().unwrap().push(document.param("n").unwrap_or("").to_string());
            Ok(())
        })
        .unwrap();

    tokio::time::timeout(TIMEOUT, crawler.run())
        .await
        .expect("crawl timed out")
        .unwrap();

    assert_eq!(crawler.state(), CrawlState::Completed);

    let stats = crawler.stats().await.unwrap();
    assert_eq!(stats.total(), 3);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.failed, 0);

    let events = drain(&mut rx);
    assert_eq!(
        document_uris(&events),
        vec![
            base_url.clone(),
            format!("{}/page1", base_url),
            format!("{}/page2", base_url),
        ]
    );

    let titles: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            CrawlEvent::Document(document) => document.title.clone(),
            _ => None,
        })
        .collect();
    assert!(titles.contains(&"Home".to_string()));

    // The external link and the mailto link were rejected, not fetched
    let rejected = events
        .iter()
        .filter(|e| matches!(e, CrawlEvent::Error(err) if err.kind() == ErrorKind::NavigationRejected))
        .count();
    assert_eq!(rejected, 2);

    let mut pages = pages.lock().unwrap().clone();
    pages.sort();
    assert_eq!(pages, vec!["1".to_string(), "2".to_string()]);

    mock_server.verify().await;
}

#[tokio::test]
async fn test_content_type_rejection() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<html><body>
            <a href="/report.pdf">Report</a>
            <a href="/untyped">Untyped</a>
            </body></html>"#
            .to_string(),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 16], "application/pdf"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/untyped"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let crawler = Crawler::new(test_config(&base_url), Arc::new(MemoryQueue::new())).unwrap();
    let mut rx = crawler.subscribe();

    tokio::time::timeout(TIMEOUT, crawler.run())
        .await
        .expect("crawl timed out")
        .unwrap();

    let queue = crawler.queue();
    let report = queue
        .item(&format!("{}/report.pdf", base_url))
        .await
        .unwrap()
        .unwrap();
    assert!(report.completed);
    assert!(report.error.unwrap().contains("Unsupported content type"));

    let untyped = queue
        .item(&format!("{}/untyped", base_url))
        .await
        .unwrap()
        .unwrap();
    assert!(untyped.completed);
    assert!(untyped.error.unwrap().contains("Content type header is missing"));

    let stats = crawler.stats().await.unwrap();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.failed, 2);

    let events = drain(&mut rx);
    assert_eq!(document_uris(&events), vec![base_url.clone()]);

    let content_type_errors = events
        .iter()
        .filter(|e| matches!(e, CrawlEvent::Error(err) if err.kind() == ErrorKind::ContentType))
        .count();
    assert_eq!(content_type_errors, 2);
}

#[tokio::test]
async fn test_auth_and_headers_sent() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .and(header("x-crawl-run", "nightly"))
        .respond_with(html("<html><body>ok</body></html>".to_string()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&base_url);
    config.auth = Some(AuthConfig {
        user: "user".to_string(),
        pass: Some("pass".to_string()),
    });
    config
        .headers
        .insert("X-Crawl-Run".to_string(), "nightly".to_string());

    let crawler = Crawler::new(config, Arc::new(MemoryQueue::new())).unwrap();
    let mut rx = crawler.subscribe();

    tokio::time::timeout(TIMEOUT, crawler.run())
        .await
        .expect("crawl timed out")
        .unwrap();

    assert_eq!(document_uris(&drain(&mut rx)), vec![base_url]);
    mock_server.verify().await;
}

#[tokio::test]
async fn test_redirect_policy() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html(r#"<html><body><a href="/found">Found</a></body></html>"#.to_string()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/found"))
        .respond_with(html("<html></html>".to_string()))
        .mount(&mock_server)
        .await;

    // Followed: links resolve against the final location
    let crawler = Crawler::new(
        test_config(&format!("{}/old", base_url)),
        Arc::new(MemoryQueue::new()),
    )
    .unwrap();
    let mut rx = crawler.subscribe();

    tokio::time::timeout(TIMEOUT, crawler.run())
        .await
        .expect("crawl timed out")
        .unwrap();

    let events = drain(&mut rx);
    let final_url = events.iter().find_map(|e| match e {
        CrawlEvent::Document(document) if document.item.uri.ends_with("/old") => {
            Some(document.response.final_url.to_string())
        }
        _ => None,
    });
    assert_eq!(final_url, Some(format!("{}/new", base_url)));
    assert!(crawler
        .queue()
        .item(&format!("{}/found", base_url))
        .await
        .unwrap()
        .is_some());

    // Not followed: the bare redirect has no content type
    let mut config = test_config(&format!("{}/old", base_url));
    config.follow_redirect = false;
    let crawler = Crawler::new(config, Arc::new(MemoryQueue::new())).unwrap();

    tokio::time::timeout(TIMEOUT, crawler.run())
        .await
        .expect("crawl timed out")
        .unwrap();

    let stats = crawler.stats().await.unwrap();
    assert_eq!(stats.total(), 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_sqlite_queue() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let links: String = (1..=6)
        .map(|i| format!(r#"<a href="/item/{}">Item {}</a>"#, i, i))
        .collect();
    mount_page(&mock_server, "/", format!("<html><body>{}</body></html>", links)).await;
    for i in 1..=6 {
        mount_page(
            &mock_server,
            &format!("/item/{}", i),
            r#"<html><body><a href="/">Home</a></body></html>"#.to_string(),
        )
        .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("queue.db");
    let options = SqliteQueueOptions {
        get_interval: Duration::from_millis(50),
        max_get_attempts: 10,
    };

    let first = Crawler::new(
        test_config(&base_url),
        Arc::new(SqliteQueue::open(&db_path, options).unwrap()),
    )
    .unwrap();

    // The second instance has no seed; it only picks up shared work
    let second_config = CrawlerConfig::default()
        .with_domains(["127.0.0.1"])
        .with_interval(10);
    let second = Crawler::new(
        second_config,
        Arc::new(SqliteQueue::open(&db_path, options).unwrap()),
    )
    .unwrap();

    let mut first_rx = first.subscribe();
    let mut second_rx = second.subscribe();

    let (a, b) = tokio::time::timeout(TIMEOUT, async { tokio::join!(first.run(), second.run()) })
        .await
        .expect("crawl timed out");
    a.unwrap();
    b.unwrap();

    let mut documents = document_uris(&drain(&mut first_rx));
    documents.extend(document_uris(&drain(&mut second_rx)));
    documents.sort();
    documents.dedup();
    assert_eq!(documents.len(), 7);

    let reader = SqliteQueue::open(&db_path, options).unwrap();
    let stats = reader.stats().await.unwrap();
    assert_eq!(stats.total(), 7);
    assert_eq!(stats.completed, 7);
    assert_eq!(stats.processing, 0);

    // Each page was fetched exactly once across both crawlers
    mock_server.verify().await;
}

#[tokio::test]
async fn test_crawl_from_config_file() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<html><body><a href="/next?page=2">Next</a></body></html>"#.to_string(),
    )
    .await;
    mount_page(&mock_server, "/next", "<html></html>".to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[crawler]
url = "{}"
interval = 10
max-concurrency = 2

[queue]
backend = "sqlite"
path = "{}"
get-interval = 10
max-get-attempts = 1
"#,
        base_url,
        db_path.display()
    )
    .unwrap();
    file.flush().unwrap();

    let config = load_config(file.path()).unwrap();
    let queue = open_queue(&config.queue).unwrap();
    let crawler = Crawler::new(config.crawler, queue).unwrap();
    let mut rx = crawler.subscribe();

    let params = Arc::new(Mutex::new(None));
    let captured = Arc::clone(&params);
    crawler
        .route("/next", move |_, document| {
            *captured.lock().unwrap() = document.param("page").map(str::to_string);
            Ok(())
        })
        .unwrap();

    tokio::time::timeout(TIMEOUT, crawler.run())
        .await
        .expect("crawl timed out")
        .unwrap();

    assert_eq!(
        document_uris(&drain(&mut rx)),
        vec![base_url.clone(), format!("{}/next?page=2", base_url)]
    );
    assert_eq!(params.lock().unwrap().as_deref(), Some("2"));

    // A second run over the same queue file finds nothing left to do
    let config = load_config(file.path()).unwrap();
    let crawler = Crawler::new(config.crawler, open_queue(&config.queue).unwrap()).unwrap();
    let mut rx = crawler.subscribe();

    tokio::time::timeout(TIMEOUT, crawler.run())
        .await
        .expect("crawl timed out")
        .unwrap();

    assert!(document_uris(&drain(&mut rx)).is_empty());
    mock_server.verify().await;
}

#[tokio::test]
async fn test_configured_encoding_is_a_fallback() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/undeclared"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"caf\xe9".to_vec(), "text/html"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/declared"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("caf\u{e9}".as_bytes().to_vec(), "text/html; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    let mut config = CrawlerConfig::default();
    config.encoding = Some("iso-8859-1".to_string());
    let fetcher = HttpFetcher::new(&config).unwrap();

    let url = url::Url::parse(&format!("{}/undeclared", mock_server.uri())).unwrap();
    let page = fetcher.fetch(&url).await.unwrap();
    assert_eq!(page.body, "caf\u{e9}");

    let url = url::Url::parse(&format!("{}/declared", mock_server.uri())).unwrap();
    let page = fetcher.fetch(&url).await.unwrap();
    assert_eq!(page.body, "caf\u{e9}");
}
