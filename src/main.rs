//! Flexcrawl main entry point
//!
//! This is the command-line interface for the Flexcrawl crawler.

use anyhow::Context;
use clap::Parser;
use flexcrawl::config::{load_config_with_hash, validate_crawler_config, Config, CrawlerConfig};
use flexcrawl::queue::{open_queue, QueueStats};
use flexcrawl::{CrawlEvent, Crawler, QueueBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Flexcrawl: a programmable web crawler
///
/// Crawls from a seed location, following links within the allowed domains.
/// Several processes can share one crawl by pointing them at the same SQLite
/// queue file.
#[derive(Parser, Debug)]
#[command(name = "flexcrawl")]
#[command(version)]
#[command(about = "A programmable web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Seed location, overriding `crawler.url`
    #[arg(long)]
    url: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the queue and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(url) = cli.url {
        config.crawler.url = Some(url);
        validate_crawler_config(&config.crawler)?;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let queue = open_queue(&config.queue)?;

    if cli.stats {
        print_stats(&queue.stats().await?);
        return Ok(());
    }

    handle_crawl(config.crawler, queue).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("flexcrawl=info,warn"),
            1 => EnvFilter::new("flexcrawl=debug,info"),
            2 => EnvFilter::new("flexcrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;

    println!("=== Flexcrawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed: {}", crawler.url.as_deref().unwrap_or("(none)"));
    println!("  Interval: {}ms", crawler.interval);
    println!("  Max concurrency: {}", crawler.max_concurrency);
    println!("  Max crawl queue length: {}", crawler.max_crawl_queue_length);
    match crawler.timeout {
        Some(timeout) => println!("  Timeout: {}ms", timeout),
        None => println!("  Timeout: none"),
    }
    if crawler.follow_redirect {
        println!("  Redirects: follow (max {})", crawler.max_redirects);
    } else {
        println!("  Redirects: not followed");
    }
    if let Some(proxy) = &crawler.proxy {
        println!("  Proxy: {}", proxy);
    }
    if crawler.auth.is_some() {
        println!("  Basic auth: yes");
    }

    let domains = crawler.allowed_domains();
    if domains.is_empty() {
        println!("\nAllowed Domains: any");
    } else {
        println!("\nAllowed Domains ({}):", domains.len());
        for domain in &domains {
            println!("  - {}", domain);
        }
    }

    println!("\nQueue:");
    println!("  Backend: {:?}", config.queue.backend);
    if let Some(path) = &config.queue.path {
        println!("  Path: {}", path);
    }

    println!("\n✓ Configuration is valid");
}

/// Prints queue counts
fn print_stats(stats: &QueueStats) {
    println!("=== Queue Statistics ===\n");
    println!("  Total: {}", stats.total());
    println!("  Pending: {}", stats.pending);
    println!("  Processing: {}", stats.processing);
    println!("  Completed: {}", stats.completed);
    println!("  Failed: {}", stats.failed);
}

/// Handles the main crawl operation
async fn handle_crawl(config: CrawlerConfig, queue: Arc<dyn QueueBackend>) -> anyhow::Result<()> {
    let crawler = Crawler::new(config, Arc::clone(&queue))?;

    crawler.route("*", |_, document| {
        tracing::info!(
            "{} {} {}",
            document.response.status.as_u16(),
            document.item.uri,
            document.title.as_deref().unwrap_or("")
        );
        Ok(())
    })?;

    // Count what happened; the engine itself logs the failures
    let mut events = crawler.subscribe();
    let reporter = tokio::spawn(async move {
        let (mut documents, mut errors) = (0usize, 0usize);
        while let Some(event) = events.recv().await {
            match event {
                CrawlEvent::Document(_) => documents += 1,
                CrawlEvent::Error(e) if !e.is_routine() => errors += 1,
                CrawlEvent::Complete => break,
                _ => {}
            }
        }
        (documents, errors)
    });

    tokio::select! {
        result = crawler.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, aborting crawl");
            crawler.abort();
            crawler.wait().await;
        }
    }

    let (documents, errors) = reporter.await?;
    tracing::info!("Processed {} document(s), {} error(s)", documents, errors);

    print_stats(&queue.stats().await?);
    Ok(())
}
