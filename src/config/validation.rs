use crate::config::types::{Config, CrawlerConfig, QueueBackendKind, QueueConfig};
use crate::url::resolve_location;
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_queue_config(&config.queue)?;
    Ok(())
}

/// Validates crawler configuration
pub fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.max_crawl_queue_length < 1 {
        return Err(ConfigError::Validation(format!(
            "max-crawl-queue-length must be >= 1, got {}",
            config.max_crawl_queue_length
        )));
    }

    if let Some(seed) = &config.url {
        resolve_location(seed, None)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;
    }

    for domain in &config.domains {
        validate_domain(domain)?;
    }

    if let Some(proxy) = &config.proxy {
        reqwest::Proxy::all(proxy.as_str())
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    if config.timeout == Some(0) {
        return Err(ConfigError::Validation(
            "timeout must be greater than 0ms".to_string(),
        ));
    }

    Ok(())
}

/// Validates queue configuration
fn validate_queue_config(config: &QueueConfig) -> Result<(), ConfigError> {
    if config.backend == QueueBackendKind::Sqlite {
        match config.path.as_deref() {
            Some(path) if !path.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::Validation(
                    "sqlite queue backend requires a path".to_string(),
                ))
            }
        }
    }

    Ok(())
}

/// Validates an allow-list entry: a bare host name
fn validate_domain(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::Validation(
            "Domain cannot be empty".to_string(),
        ));
    }

    if domain.contains('/') || domain.contains('*') || domain.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' must be a plain host name",
            domain
        )));
    }

    Ok(())
}
