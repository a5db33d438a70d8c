//! Small helpers for URL handling and logging.

use url::Url;

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with an
/// ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```
/// use news_fetcher::utils::truncate_for_log;
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Lowercased host of an absolute URL, without port.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

/// True if `host` is `domain` or one of its subdomains.
///
/// `host_matches("m.bit.ly", "bit.ly")` is true; `host_matches("notbit.ly", "bit.ly")` is not.
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.trim_end_matches('.');
    if host.eq_ignore_ascii_case(domain) {
        return true;
    }
    host.len() > domain.len()
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
        && host
            .get(host.len() - domain.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(domain))
}

/// Strip the quotes and whitespace that often wrap URLs in attributes and scripts.
pub fn trim_url_quotes(raw: &str) -> &str {
    raw.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
}

/// Resolve `found` against `base`, yielding an absolute http(s) URL.
///
/// Returns `None` for empty input, unparseable input, and non-web schemes
/// such as `javascript:` or `mailto:`.
pub fn absolutize(base: &str, found: &str) -> Option<String> {
    let found = trim_url_quotes(found);
    if found.is_empty() {
        return None;
    }
    let joined = match Url::parse(base) {
        Ok(base) => base.join(found).ok()?,
        Err(_) => Url::parse(found).ok()?,
    };
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}
