//! HTML inspection.
//!
//! Fetches the page and looks for the places publishers and redirect pages
//! announce the "real" URL, first match wins:
//!
//! 1. `<link rel="canonical">`
//! 2. `<meta property="og:url">` (or `name="og:url"`)
//! 3. `<meta http-equiv="refresh" content="0;url=...">`
//! 4. `window.location = "..."`, `window.location.href = "..."`,
//!    `window.location.replace("...")` / `.assign("...")` in inline script
//! 5. the `url` field of a JSON-LD block
//! 6. the first absolute outbound link not pointing at a known redirector
//!
//! Relative targets are resolved against the URL the page was served from.

use super::{ResolveStrategy, http_client};
use crate::models::ResolutionRequest;
use crate::resolver::domains::is_redirect_domain;
use crate::utils::{absolutize, truncate_for_log};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

static CANONICAL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel~="canonical"][href]"#).unwrap());
static OG_URL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:url"][content], meta[name="og:url"][content]"#).unwrap()
});
static META_HTTP_EQUIV: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[http-equiv][content]").unwrap());
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

// everything after `url=` is the target; `;` is legal inside URLs
static REFRESH_TARGET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)url\s*=\s*(.+)").unwrap());
static JS_LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"window\.location(?:\.href)?\s*=\s*["']([^"']+)["']|window\.location(?:\.replace|\.assign)?\(\s*["']([^"']+)["']\s*\)"#,
    )
    .unwrap()
});

#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlInspectionStrategy;

impl HtmlInspectionStrategy {
    async fn fetch_and_inspect(
        &self,
        request: &ResolutionRequest,
    ) -> Result<Option<String>, reqwest::Error> {
        let client = http_client(request, HeaderMap::new())?;
        let response = client.get(&request.url).send().await?.error_for_status()?;
        let served_from = response.url().to_string();
        let body = response.text().await?;
        debug!(%served_from, body = %truncate_for_log(&body, 200), "Fetched page for inspection");
        Ok(inspect_html(&body, &served_from))
    }
}

#[async_trait]
impl ResolveStrategy for HtmlInspectionStrategy {
    fn name(&self) -> &'static str {
        "html"
    }

    #[instrument(level = "debug", skip_all, fields(url = %request.url))]
    async fn attempt(&self, request: &ResolutionRequest) -> Option<String> {
        match self.fetch_and_inspect(request).await {
            Ok(found) => found,
            Err(e) => {
                crate::diag_warn!(request.verbose, error = %e, "HTML resolve failed");
                None
            }
        }
    }
}

/// Find the URL this page says it really lives at.
///
/// Checks, in order: `<link rel="canonical">`, `og:url`, a meta refresh,
/// a `window.location` assignment in inline script, a JSON-LD `url`, and
/// finally the first outbound link that is not itself a redirector. Relative
/// targets are joined onto `page_url`.
///
/// # Arguments
///
/// * `html` - The page markup
/// * `page_url` - Where the markup was fetched from, used as the base URL
///
/// # Returns
///
/// The first absolute `http(s)` candidate found, or `None` if the page
/// names none.
///
/// # Examples
///
/// ```
/// use news_fetcher::resolver::strategies::html::inspect_html;
///
/// let page = r#"<head><link rel="canonical" href="/2025/story.html"></head>"#;
/// assert_eq!(
///     inspect_html(page, "https://www.publisher.com/amp/story").as_deref(),
///     Some("https://www.publisher.com/2025/story.html"),
/// );
/// assert_eq!(inspect_html("<p>nothing here</p>", "https://www.publisher.com/"), None);
/// ```
pub fn inspect_html(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let attr_of = |selector: &Selector, attr: &str| {
        document
            .select(selector)
            .filter_map(|el| el.value().attr(attr))
            .find_map(|value| absolutize(page_url, value))
    };

    attr_of(&CANONICAL, "href")
        .or_else(|| attr_of(&OG_URL, "content"))
        .or_else(|| meta_refresh_target(&document, page_url))
        .or_else(|| script_location_target(html, page_url))
        .or_else(|| json_ld_url(&document, page_url))
        .or_else(|| first_outbound_link(&document))
}

/// Target of a `<meta http-equiv="refresh">`, with any `http-equiv` casing.
pub(crate) fn meta_refresh_target(document: &Html, page_url: &str) -> Option<String> {
    document
        .select(&META_HTTP_EQUIV)
        .filter(|el| {
            el.value()
                .attr("http-equiv")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"))
        })
        .filter_map(|el| el.value().attr("content"))
        .filter_map(|content| REFRESH_TARGET.captures(content))
        .find_map(|caps| absolutize(page_url, caps.get(1)?.as_str()))
}

/// First absolute `http(s)` link whose host is not a known redirector.
pub(crate) fn first_outbound_link(document: &Html) -> Option<String> {
    document
        .select(&ANCHOR)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|href| href.starts_with("http") && !is_redirect_domain(href))
        .map(str::to_string)
}

fn script_location_target(html: &str, page_url: &str) -> Option<String> {
    JS_LOCATION.captures_iter(html).find_map(|caps| {
        let target = caps.get(1).or_else(|| caps.get(2))?;
        absolutize(page_url, target.as_str())
    })
}

fn json_ld_url(document: &Html, page_url: &str) -> Option<String> {
    document.select(&JSON_LD).find_map(|script| {
        let text = script.text().collect::<String>();
        let data: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
        let url = match &data {
            serde_json::Value::Array(items) => items
                .iter()
                .find_map(|item| item.get("url").and_then(|u| u.as_str())),
            other => other.get("url").and_then(|u| u.as_str()),
        }?;
        absolutize(page_url, url)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://redirect.example.net/r/123";

    #[test]
    fn test_canonical_wins_over_everything() {
        let html = r#"<html><head>
            <link rel="canonical" href="https://www.example.com/story">
            <meta property="og:url" content="https://og.example.com/story">
            <meta http-equiv="refresh" content="0;url=https://refresh.example.com/">
            </head></html>"#;
        assert_eq!(
            inspect_html(html, PAGE).as_deref(),
            Some("https://www.example.com/story")
        );
    }

    #[test]
    fn test_relative_canonical_is_resolved() {
        let html = r#"<link rel="canonical" href="/news/2025/story.html">"#;
        assert_eq!(
            inspect_html(html, PAGE).as_deref(),
            Some("https://redirect.example.net/news/2025/story.html")
        );
    }

    #[test]
    fn test_og_url_by_property_and_name() {
        let by_property = r#"<meta property="og:url" content="https://a.example.com/x">"#;
        let by_name = r#"<meta name="og:url" content="https://b.example.com/y">"#;
        assert_eq!(
            inspect_html(by_property, PAGE).as_deref(),
            Some("https://a.example.com/x")
        );
        assert_eq!(
            inspect_html(by_name, PAGE).as_deref(),
            Some("https://b.example.com/y")
        );
    }

    #[test]
    fn test_meta_refresh_only() {
        let html = r#"<html><head><meta http-equiv="refresh" content="0;url=https://example.com/a"></head><body></body></html>"#;
        assert_eq!(
            inspect_html(html, PAGE).as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn test_meta_refresh_casing_and_quotes() {
        let html = r#"<meta HTTP-EQUIV="Refresh" content="5; URL='/landing'">"#;
        assert_eq!(
            inspect_html(html, PAGE).as_deref(),
            Some("https://redirect.example.net/landing")
        );
    }

    #[test]
    fn test_meta_refresh_keeps_semicolons_in_target() {
        let html = r#"<meta http-equiv="refresh" content="0;url=https://www.example.com/story;jsessionid=ABC?id=7">"#;
        assert_eq!(
            inspect_html(html, PAGE).as_deref(),
            Some("https://www.example.com/story;jsessionid=ABC?id=7")
        );

        let quoted = r#"<meta http-equiv="refresh" content="0; URL='https://www.example.com/a;b=1'">"#;
        assert_eq!(
            inspect_html(quoted, PAGE).as_deref(),
            Some("https://www.example.com/a;b=1")
        );
    }

    #[test]
    fn test_window_location_variants() {
        let assign = r#"<script>window.location = "https://js.example.com/1";</script>"#;
        let href = r#"<script>window.location.href='https://js.example.com/2'</script>"#;
        let replace = r#"<script>window.location.replace("https://js.example.com/3")</script>"#;
        assert_eq!(
            inspect_html(assign, PAGE).as_deref(),
            Some("https://js.example.com/1")
        );
        assert_eq!(
            inspect_html(href, PAGE).as_deref(),
            Some("https://js.example.com/2")
        );
        assert_eq!(
            inspect_html(replace, PAGE).as_deref(),
            Some("https://js.example.com/3")
        );
    }

    #[test]
    fn test_json_ld_object_and_array() {
        let object = r#"<script type="application/ld+json">{"@type":"NewsArticle","url":"https://ld.example.com/a"}</script>"#;
        let array = r#"<script type="application/ld+json">[{"@type":"Organization"},{"url":"https://ld.example.com/b"}]</script>"#;
        let broken = r#"<script type="application/ld+json">{not json</script>"#;
        assert_eq!(
            inspect_html(object, PAGE).as_deref(),
            Some("https://ld.example.com/a")
        );
        assert_eq!(
            inspect_html(array, PAGE).as_deref(),
            Some("https://ld.example.com/b")
        );
        assert_eq!(inspect_html(broken, PAGE), None);
    }

    #[test]
    fn test_outbound_link_skips_redirectors_and_relative() {
        let html = r#"<body>
            <a href="/about">About</a>
            <a href="https://bit.ly/xyz">short</a>
            <a href="https://news.google.com/foo">aggregator</a>
            <a href="https://www.publisher.com/article">article</a>
        </body>"#;
        assert_eq!(
            inspect_html(html, PAGE).as_deref(),
            Some("https://www.publisher.com/article")
        );
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(inspect_html("<html><body><p>hi</p></body></html>", PAGE), None);
        assert_eq!(inspect_html("", PAGE), None);
    }
}
