//! HTTP fetcher for listing and item pages
//!
//! This module handles:
//! - Building the HTTP client from the crawler configuration
//! - GET requests with status and Content-Type classification
//! - Capturing the `Date` response header as the observation time

use crate::config::CrawlerConfig;
use reqwest::header::{CONTENT_TYPE, DATE};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

const MAX_REDIRECTS: usize = 10;

/// A successfully fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    pub status_code: u16,
    pub body: String,
    /// Raw `Date` response header
    pub date: Option<String>,
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    Success(FetchedPage),

    /// Page is not HTML (Content-Type mismatch)
    ContentMismatch { content_type: String },

    /// Non-success HTTP status
    HttpError { status_code: u16 },

    /// Network error (connection refused, timeout, etc.)
    NetworkError { error: String },
}

impl FetchResult {
    pub fn into_page(self) -> Option<FetchedPage> {
        match self {
            FetchResult::Success(page) => Some(page),
            _ => None,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration (user agent and timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    let timeout = config.request_timeout();

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and classifies the response
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx with `text/html` (or no Content-Type) | `Success` |
/// | 2xx with another Content-Type | `ContentMismatch` |
/// | Any other status | `HttpError` |
/// | Timeout, connection or body error | `NetworkError` |
pub async fn fetch_url(client: &Client, url: &Url) -> FetchResult {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            let error = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                "Connection refused".to_string()
            } else {
                e.to_string()
            };
            return FetchResult::NetworkError { error };
        }
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    let content_type = header_value(&response, CONTENT_TYPE.as_str()).unwrap_or_default();
    if !content_type.is_empty() && !content_type.contains("text/html") {
        return FetchResult::ContentMismatch { content_type };
    }

    let final_url = response.url().clone();
    let date = header_value(&response, DATE.as_str());

    match response.text().await {
        Ok(body) => FetchResult::Success(FetchedPage {
            final_url,
            status_code: status.as_u16(),
            body,
            date,
        }),
        Err(e) => FetchResult::NetworkError {
            error: e.to_string(),
        },
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
