//! Known redirector hosts and redirect-prone URL shapes.
//!
//! Two questions are answered here, both against the same static data:
//!
//! - [`classify`] / [`needs_resolution`]: does this input plausibly need the
//!   cascade at all?
//! - [`is_redirect_domain`] / [`is_acceptable`]: is a strategy's candidate
//!   still sitting on a redirector, i.e. not an answer yet?
//!
//! The data is read-only and shared by every concurrent resolution.

use crate::utils::{host_matches, host_of};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use url::Url;

/// Aggregators and URL shorteners whose links never point at the article itself.
pub static REDIRECT_DOMAINS: &[&str] = &[
    "news.google.com",
    "bit.ly",
    "goo.gl",
    "t.co",
    "tinyurl.com",
    "ow.ly",
    "buff.ly",
    "ift.tt",
    "dlvr.it",
];

/// URL fragments that suggest there is a better URL behind this one.
static REDIRECT_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        r"/rss/articles/", // aggregator RSS item
        r"/amp/",          // AMP copy, canonical lives elsewhere
        r"/url\?q=",       // search-engine click-through
        r"utm_",           // tracking parameters
    ]
    .into_iter()
    .map(|p| {
        let re = RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .expect("redirect pattern is a valid regex");
        (p, re)
    })
    .collect()
});

/// Resolution is attempted even when no signal matches. Flip to skip the
/// cascade for URLs that show no sign of redirecting.
const RESOLVE_WITHOUT_SIGNAL: bool = true;

/// What the classifier saw in a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectSignal {
    /// Host is (a subdomain of) a known redirector.
    KnownDomain(&'static str),
    /// URL matches one of the redirect-prone patterns.
    Pattern(&'static str),
    /// Nothing matched.
    NoSignal,
    /// Could not be parsed as an absolute URL.
    Unparseable,
}

impl RedirectSignal {
    pub fn requires_resolution(&self) -> bool {
        match self {
            RedirectSignal::KnownDomain(_) | RedirectSignal::Pattern(_) => true,
            RedirectSignal::Unparseable => true,
            RedirectSignal::NoSignal => RESOLVE_WITHOUT_SIGNAL,
        }
    }
}

/// Classify `url` without logging.
pub fn classify(url: &str) -> RedirectSignal {
    let Ok(parsed) = Url::parse(url) else {
        return RedirectSignal::Unparseable;
    };

    if let Some(host) = parsed.host_str() {
        if let Some(domain) = REDIRECT_DOMAINS
            .iter()
            .copied()
            .find(|d| host_matches(host, d))
        {
            return RedirectSignal::KnownDomain(domain);
        }
    }

    REDIRECT_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(url))
        .map(|(p, _)| RedirectSignal::Pattern(*p))
        .unwrap_or(RedirectSignal::NoSignal)
}

/// Decide whether `url` should go through the resolution cascade.
///
/// Never fails: an unparseable URL counts as needing resolution. With the
/// current permissive default this returns `true` for every input.
pub fn needs_resolution(url: &str, verbose: bool) -> bool {
    let signal = classify(url);
    match signal {
        RedirectSignal::KnownDomain(domain) => {
            crate::diag_info!(verbose, %url, domain, "Redirect domain detected")
        }
        RedirectSignal::Pattern(pattern) => {
            crate::diag_info!(verbose, %url, pattern, "Redirect pattern detected")
        }
        RedirectSignal::NoSignal => {
            crate::diag_info!(verbose, %url, "No redirect signal; resolving anyway")
        }
        RedirectSignal::Unparseable => {
            crate::diag_warn!(verbose, %url, "Could not parse URL; assuming it needs resolution")
        }
    }
    signal.requires_resolution()
}

/// True if `url` is hosted on a known redirector, or has no host to check.
pub fn is_redirect_domain(url: &str) -> bool {
    match host_of(url) {
        Some(host) => REDIRECT_DOMAINS.iter().any(|d| host_matches(&host, d)),
        None => true,
    }
}

/// The acceptance test applied to every strategy's candidate: a non-empty
/// absolute URL whose host is not a redirector.
pub fn is_acceptable(candidate: &str) -> bool {
    !candidate.trim().is_empty() && !is_redirect_domain(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_domains_and_subdomains() {
        assert_eq!(
            classify("https://bit.ly/3xyz"),
            RedirectSignal::KnownDomain("bit.ly")
        );
        assert_eq!(
            classify("https://m.tinyurl.com/abc"),
            RedirectSignal::KnownDomain("tinyurl.com")
        );
        assert_eq!(
            classify("https://news.google.com/rss/articles/CBMiXYZ"),
            RedirectSignal::KnownDomain("news.google.com")
        );
    }

    #[test]
    fn test_patterns() {
        assert_eq!(
            classify("https://www.example.com/amp/story"),
            RedirectSignal::Pattern("/amp/")
        );
        assert_eq!(
            classify("https://www.example.com/story?UTM_source=rss"),
            RedirectSignal::Pattern("utm_")
        );
        assert_eq!(
            classify("https://www.google.com/url?q=https://example.com"),
            RedirectSignal::Pattern(r"/url\?q=")
        );
        assert_eq!(
            classify("https://mirror.example.org/rss/articles/abc"),
            RedirectSignal::Pattern("/rss/articles/")
        );
    }

    #[test]
    fn test_lookalike_host_is_not_a_known_domain() {
        assert_eq!(
            classify("https://www.microsoft.com/en-us/news"),
            RedirectSignal::NoSignal
        );
        assert_eq!(classify("https://notbit.ly/x"), RedirectSignal::NoSignal);
    }

    #[test]
    fn test_permissive_default_still_resolves() {
        // a plain publisher URL matches nothing, yet resolution still proceeds
        let url = "https://www.reuters.com/world/some-story-2025-05-06/";
        assert_eq!(classify(url), RedirectSignal::NoSignal);
        assert!(needs_resolution(url, true));
        assert!(needs_resolution(url, false));
    }

    #[test]
    fn test_unparseable_input_needs_resolution() {
        assert_eq!(classify("not a url"), RedirectSignal::Unparseable);
        assert!(needs_resolution("not a url", true));
        assert!(needs_resolution("", false));
    }

    #[test]
    fn test_is_redirect_domain() {
        assert!(is_redirect_domain("https://t.co/abc"));
        assert!(is_redirect_domain("https://news.google.com/articles/x"));
        assert!(is_redirect_domain("https://amp.news.google.com/x"));
        assert!(!is_redirect_domain("https://www.nytimes.com/2025/05/06/x.html"));
        assert!(!is_redirect_domain("https://www.microsoft.com/"));
        // no host to vouch for
        assert!(is_redirect_domain(""));
        assert!(is_redirect_domain("/relative/only"));
    }

    #[test]
    fn test_acceptance_filter() {
        assert!(is_acceptable("https://www.bbc.com/news/world-123"));
        assert!(!is_acceptable(""));
        assert!(!is_acceptable("   "));
        for domain in REDIRECT_DOMAINS {
            assert!(!is_acceptable(&format!("https://{domain}/x")), "{domain}");
            assert!(!is_acceptable(&format!("https://sub.{domain}/x")), "sub.{domain}");
        }
    }
}
