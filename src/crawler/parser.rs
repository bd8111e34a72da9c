//! Listing page parser
//!
//! This module extracts from one listing page:
//! - Item links to visit (absolute, inside the allowed domain, deduplicated)
//! - The "next page" link, if any

use crate::config::CrawlerConfig;
use crate::url::is_allowed;
use crate::{ConfigError, ConfigResult};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// What a listing page links to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    /// Item pages in document order
    pub item_links: Vec<Url>,
    pub next_page: Option<Url>,
}

/// Compiled listing-page selectors and link filters
#[derive(Debug, Clone)]
pub struct ListingParser {
    item_link: Selector,
    next_page: Selector,
    allowed_domain: String,
    skip_pattern: String,
}

impl ListingParser {
    pub fn new(config: &CrawlerConfig) -> ConfigResult<Self> {
        Ok(Self {
            item_link: parse_selector(&config.item_link_selector)?,
            next_page: parse_selector(&config.next_page_selector)?,
            allowed_domain: config.allowed_domain.clone(),
            skip_pattern: config.skip_link_pattern.clone(),
        })
    }

    /// Parses a listing page
    ///
    /// # Link Rules
    ///
    /// - Relative hrefs are resolved against `base_url`
    /// - Links outside the allowed domain are dropped
    /// - Links containing the skip pattern (new-car promos) are dropped
    /// - Repeated links are kept once, at their first position
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ria_harvest::config::load_config;
    /// use ria_harvest::crawler::ListingParser;
    /// use std::path::Path;
    /// use url::Url;
    ///
    /// let config = load_config(Path::new("harvest.toml")).unwrap();
    /// let parser = ListingParser::new(&config.crawler).unwrap();
    /// let base = Url::parse("https://auto.ria.com/uk/car/used/?page=1").unwrap();
    /// let page = parser.parse(r#"<a class="address" href="/uk/auto_1.html">x</a>"#, &base);
    /// assert_eq!(page.item_links.len(), 1);
    /// ```
    pub fn parse(&self, html: &str, base_url: &Url) -> ListingPage {
        let document = Html::parse_document(html);

        let mut seen = HashSet::new();
        let mut item_links = Vec::new();
        for element in document.select(&self.item_link) {
            let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url))
            else {
                continue;
            };

            if !self.skip_pattern.is_empty() && url.as_str().contains(&self.skip_pattern) {
                tracing::trace!("Skipping promoted link {}", url);
                continue;
            }
            if !is_allowed(&url, &self.allowed_domain) {
                tracing::debug!("Skipping off-domain link {}", url);
                continue;
            }
            if seen.insert(url.to_string()) {
                item_links.push(url);
            }
        }

        let next_page = document
            .select(&self.next_page)
            .filter_map(|e| e.value().attr("href"))
            .filter_map(|h| resolve_link(h, base_url))
            .find(|url| is_allowed(url, &self.allowed_domain) && url != base_url);

        ListingPage {
            item_links,
            next_page,
        }
    }
}

fn parse_selector(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url)
}
