/// Checks if a domain matches a wildcard pattern
///
/// "auto.ria.com" matches only itself; "*.ria.com" matches "ria.com" and
/// any subdomain of it. Both arguments are expected in lowercase.
///
/// # Examples
///
/// ```
/// use ria_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("auto.ria.com", "auto.ria.com"));
/// assert!(matches_wildcard("*.ria.com", "auto.ria.com"));
/// assert!(!matches_wildcard("*.ria.com", "ria.com.ua"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}
