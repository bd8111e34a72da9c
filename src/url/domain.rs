use super::matcher::matches_wildcard;
use url::Url;

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ria_harvest::url::extract_domain;
///
/// let url = Url::parse("https://AUTO.ria.com/uk/auto_bmw_x5_1.html").unwrap();
/// assert_eq!(extract_domain(&url), Some("auto.ria.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if `url` is an http(s) URL whose host matches `pattern`
pub fn is_allowed(url: &Url, pattern: &str) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }
    extract_domain(url)
        .map(|domain| matches_wildcard(&pattern.to_lowercase(), &domain))
        .unwrap_or(false)
}
