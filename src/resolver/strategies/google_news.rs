//! Google News article links.
//!
//! `news.google.com/rss/articles/<id>` links no longer redirect with a plain
//! 3xx. The interstitial page carries a data blob in `c-wiz[data-p]`; posting a
//! reshaped copy of it to the site's batch-RPC endpoint returns the publisher
//! URL buried in JSON-inside-JSON.
//!
//! # Flow
//!
//! 1. Plain redirect attempt. If it lands off the aggregator host, done.
//! 2. GET the interstitial page.
//! 3. [`build_batch_request`]: `data-p` blob → `f.req` form value.
//! 4. POST to the batch endpoint; [`extract_article_url`] digs out the URL.
//! 5. If the markup or payload is not what we expect: meta-refresh target,
//!    then the first non-redirector link, then one more plain redirect attempt.
//!
//! Network failures in steps 2 and 4 end the attempt; shape failures fall back.

use super::html::{first_outbound_link, meta_refresh_target};
use super::{ResolveStrategy, http_client};
use crate::config::AggregatorEndpoints;
use crate::error::{PayloadError, StrategyError};
use crate::models::ResolutionRequest;
use crate::utils::{host_matches, host_of, truncate_for_log};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, ORIGIN, REFERER};
use scraper::{Html, Selector};
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

static DATA_CONTAINER: Lazy<Selector> = Lazy::new(|| Selector::parse("c-wiz[data-p]").unwrap());

/// RPC id of the article-URL lookup.
const RPC_ID: &str = "Fbv4je";
/// Prefix the blob uses in place of its request tag.
const BLOB_MARKER: &str = "%.@.";
const REQUEST_TAG: &str = r#"["garturlreq","#;
/// Anti-XSSI guard in front of every batch response.
const XSSI_PREFIX: &str = ")]}'";

#[derive(Debug, Clone)]
pub struct GoogleNewsStrategy {
    endpoints: AggregatorEndpoints,
}

impl GoogleNewsStrategy {
    pub fn new(endpoints: AggregatorEndpoints) -> Self {
        Self { endpoints }
    }

    fn on_aggregator(&self, url: &str) -> bool {
        host_of(url).is_some_and(|h| host_matches(&h, &self.endpoints.host))
    }

    fn client(&self, request: &ResolutionRequest) -> reqwest::Result<Client> {
        let mut headers = HeaderMap::new();
        let referer = format!("{}/", self.endpoints.origin());
        if let Ok(value) = HeaderValue::from_str(&referer) {
            headers.insert(REFERER, value);
        }
        http_client(request, headers)
    }

    /// Follow the redirect chain; `Some` only if it leaves the aggregator.
    async fn simple_redirect(&self, client: &Client, url: &str) -> Option<String> {
        let response = client.get(url).send().await.ok()?;
        let landed = response.url().to_string();
        (!self.on_aggregator(&landed)).then_some(landed)
    }

    async fn resolve(&self, request: &ResolutionRequest) -> Result<Option<String>, StrategyError> {
        let client = self.client(request)?;

        if let Some(direct) = self.simple_redirect(&client, &request.url).await {
            debug!(%direct, "Plain redirect left the aggregator");
            return Ok(Some(direct));
        }

        let html = client
            .get(&request.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let freq = match build_batch_request(&html) {
            Ok(freq) => freq,
            Err(e) => {
                crate::diag_warn!(request.verbose, error = %e, "Interstitial payload not found; using fallbacks");
                return Ok(self.fallback(&client, &html, &request.url).await);
            }
        };

        let body = client
            .post(&self.endpoints.batch_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded;charset=UTF-8")
            .header(ORIGIN, self.endpoints.origin())
            .body(format!("f.req={}", urlencoding::encode(&freq)))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        match extract_article_url(&body) {
            Ok(article) => Ok(Some(article)),
            Err(e) => {
                crate::diag_warn!(
                    request.verbose,
                    error = %e,
                    response = %truncate_for_log(&body, 300),
                    "Batch response had no article URL; using fallbacks"
                );
                Ok(self.fallback(&client, &html, &request.url).await)
            }
        }
    }

    async fn fallback(&self, client: &Client, html: &str, url: &str) -> Option<String> {
        // Html is not Send; keep it out of scope across the await below
        let from_markup = {
            let document = Html::parse_document(html);
            meta_refresh_target(&document, url).or_else(|| first_outbound_link(&document))
        };
        match from_markup {
            Some(found) => Some(found),
            None => self.simple_redirect(client, url).await,
        }
    }
}

#[async_trait]
impl ResolveStrategy for GoogleNewsStrategy {
    fn name(&self) -> &'static str {
        "google_news"
    }

    /// Only aggregator article links: `/rss/articles/<id>` or `/articles/<id>`.
    fn applies_to(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|u| {
            u.host_str()
                .is_some_and(|h| host_matches(h, &self.endpoints.host))
                && (u.path().starts_with("/rss/articles/") || u.path().starts_with("/articles/"))
        })
    }

    #[instrument(level = "debug", skip_all, fields(url = %request.url))]
    async fn attempt(&self, request: &ResolutionRequest) -> Option<String> {
        match self.resolve(request).await {
            Ok(found) => found,
            Err(e) => {
                crate::diag_warn!(request.verbose, error = %e, "GoogleNews resolve failed");
                None
            }
        }
    }
}

/// Turn the interstitial page into the `f.req` value the batch endpoint expects.
///
/// The `data-p` blob is a JSON array once its marker is rewritten to the
/// request tag. The RPC wants that array without its six trailing elements,
/// followed by the last two.
pub fn build_batch_request(html: &str) -> Result<String, PayloadError> {
    let blob = {
        let document = Html::parse_document(html);
        let node = document
            .select(&DATA_CONTAINER)
            .next()
            .ok_or(PayloadError::MissingContainer)?;
        node.value().attr("data-p").unwrap_or_default().to_string()
    };
    if blob.trim().is_empty() {
        return Err(PayloadError::EmptyBlob);
    }

    let parsed: Value = serde_json::from_str(&blob.replace(BLOB_MARKER, REQUEST_TAG))
        .map_err(PayloadError::MalformedBlob)?;
    let items = parsed
        .as_array()
        .ok_or(PayloadError::UnexpectedShape("data blob is not an array"))?;

    let head_end = items.len().saturating_sub(6);
    let tail_start = items.len().saturating_sub(2);
    let reshaped: Vec<&Value> = items[..head_end].iter().chain(&items[tail_start..]).collect();

    let inner = serde_json::to_string(&reshaped).map_err(PayloadError::MalformedBlob)?;
    Ok(json!([[[RPC_ID, inner, "null", "generic"]]]).to_string())
}

/// Dig the publisher URL out of a batch-RPC response body.
///
/// The body is `)]}'` followed by one or more JSON chunks. The wanted entry
/// is an array whose third element is itself a JSON-encoded array with the
/// URL as its second element.
///
/// # Arguments
///
/// * `body` - The raw response body, XSSI prefix included
///
/// # Returns
///
/// The publisher URL, or [`PayloadError::NoArticleUrl`] when no entry
/// carries one.
///
/// # Examples
///
/// ```
/// use news_fetcher::resolver::strategies::google_news::extract_article_url;
///
/// let body = r#")]}'
///
/// [["wrb.fr","Fbv4je","[\"garturlres\",\"https://www.publisher.com/story\",1]",null,null,null,"generic"]]"#;
/// assert_eq!(extract_article_url(body).unwrap(), "https://www.publisher.com/story");
/// assert!(extract_article_url(")]}'\n[[\"di\",12]]").is_err());
/// ```
pub fn extract_article_url(body: &str) -> Result<String, PayloadError> {
    let text = body.replacen(XSSI_PREFIX, "", 1);

    // chunks may be separated by byte-length lines; only arrays matter
    let chunks = serde_json::Deserializer::from_str(text.trim())
        .into_iter::<Value>()
        .map_while(Result::ok)
        .filter(Value::is_array);

    for chunk in chunks {
        let Some(entries) = chunk.as_array() else {
            continue;
        };
        for entry in entries {
            if let Some(found) = article_url_from_entry(entry) {
                return Ok(found);
            }
        }
    }
    Err(PayloadError::NoArticleUrl)
}

fn article_url_from_entry(entry: &Value) -> Option<String> {
    let encoded = entry.as_array().filter(|e| e.len() >= 3)?.get(2)?.as_str()?;
    if encoded.is_empty() {
        return None;
    }
    let inner: Value = serde_json::from_str(encoded).ok()?;
    let url = inner.as_array().filter(|i| i.len() >= 2)?.get(1)?.as_str()?;
    Some(url.to_string())
}
