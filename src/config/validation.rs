use crate::config::types::{
    BrowserConfig, Config, CrawlerConfig, ExtractConfig, OutputConfig, ScheduleConfig,
};
use crate::ConfigError;
use regex::RegexBuilder;
use scraper::Selector;
use url::Url;

/// Upper bound on worker processes per run
pub const MAX_CHUNKS: u32 = 32;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_config(&config.browser)?;
    validate_extract_config(&config.extract)?;
    validate_output_config(&config.output)?;
    validate_schedule_config(&config.schedule)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let start = Url::parse(&config.start_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start-url: {}", e)))?;

    if start.scheme() != "http" && start.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "start-url '{}' must use http or https",
            config.start_url
        )));
    }

    validate_domain_pattern(&config.allowed_domain)?;

    if !crate::url::is_allowed(&start, &config.allowed_domain) {
        return Err(ConfigError::Validation(format!(
            "start-url '{}' is outside allowed-domain '{}'",
            config.start_url, config.allowed_domain
        )));
    }

    if config.total_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "total-pages must be >= 1, got {}",
            config.total_pages
        )));
    }

    if config.chunks < 1 || config.chunks > MAX_CHUNKS {
        return Err(ConfigError::Validation(format!(
            "chunks must be between 1 and {}, got {}",
            MAX_CHUNKS, config.chunks
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    validate_selector("item-link-selector", &config.item_link_selector)?;
    validate_selector("next-page-selector", &config.next_page_selector)?;

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "poll-interval-ms must be > 0".to_string(),
        ));
    }

    for (name, value) in [
        ("popup-timeout-ms", config.popup_timeout_ms),
        ("locate-timeout-ms", config.locate_timeout_ms),
        ("reveal-timeout-ms", config.reveal_timeout_ms),
    ] {
        if value < config.poll_interval_ms {
            return Err(ConfigError::Validation(format!(
                "{} ({}ms) must be >= poll-interval-ms ({}ms)",
                name, value, config.poll_interval_ms
            )));
        }
    }

    Ok(())
}

/// Validates extraction rules: every selector must parse and the
/// deleted-listing pattern must compile
fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    if config.country_code.is_empty() || !config.country_code.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ConfigError::Validation(format!(
            "country-code must be digits only, got '{}'",
            config.country_code
        )));
    }

    if config.vin_selectors.is_empty() {
        return Err(ConfigError::Validation(
            "vin-selectors must contain at least one selector".to_string(),
        ));
    }

    validate_selector("price-selector", &config.price_selector)?;
    validate_selector("price-fallback-selector", &config.price_fallback_selector)?;
    validate_selector("odometer-selector", &config.odometer_selector)?;
    validate_selector("title-selector", &config.title_selector)?;
    validate_selector("image-selector", &config.image_selector)?;
    validate_selector("images-count-selector", &config.images_count_selector)?;
    validate_selector("plate-selector", &config.plate_selector)?;
    validate_selector("deleted-notice-selector", &config.deleted_notice_selector)?;
    for selector in config.vin_selectors.iter().chain(&config.seller_selectors) {
        validate_selector("selector list entry", selector)?;
    }

    RegexBuilder::new(&config.deleted_notice_pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            ConfigError::Validation(format!("Invalid deleted-notice-pattern: {}", e))
        })?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("artifact-dir", &config.artifact_dir),
        ("canonical-path", &config.canonical_path),
        ("database-path", &config.database_path),
        ("backup-dir", &config.backup_dir),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

fn validate_schedule_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
    crate::schedule::parse_time_of_day(&config.scrape_at)?;
    crate::schedule::parse_time_of_day(&config.backup_at)?;
    Ok(())
}

fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e)))
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_domain_string(domain)
    } else {
        validate_domain_string(pattern)
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    // Bare hosts like "localhost" are allowed so the crawler can be pointed at a local mirror
    Ok(())
}
