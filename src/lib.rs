//! # news_fetcher
//!
//! Turn the links a news feed hands out into the article behind them.
//!
//! Feed links rarely point at the publisher: aggregator article links, URL
//! shorteners and tracking redirects all sit in between. [`RedirectResolver`]
//! peels those layers off with a cascade of strategies, cheapest first:
//!
//! 1. the aggregator's own batch-RPC decoding (for `news.google.com` article links)
//! 2. plain HTTP redirect following
//! 3. HTML inspection (canonical, `og:url`, meta refresh, script redirects, JSON-LD)
//! 4. a headless Chromium, for redirects that only happen client-side
//!
//! [`NewsContentFetcher`] puts a concurrency limit in front of the resolver and
//! renders the resolved page into raw and relevance-filtered markdown.
//!
//! Neither ever returns an error: resolution degrades to the input URL and a
//! failed fetch is `None`.
//!
//! ```no_run
//! use news_fetcher::{FetcherConfig, NewsContentFetcher};
//!
//! # async fn run() {
//! let fetcher = NewsContentFetcher::new(FetcherConfig::default());
//! if let Some(content) = fetcher.fetch("https://bit.ly/example", Some("election")).await {
//!     println!("{} -> {} bytes of markdown", content.final_url, content.markdown_raw.len());
//! }
//! fetcher.shutdown().await;
//! # }
//! ```

pub mod diagnostics;

pub mod browser;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod outputs;
pub mod resolver;
pub mod utils;

pub use config::{AggregatorEndpoints, BrowserSettings, FetcherConfig, ResolverConfig, load_config};
pub use fetcher::NewsContentFetcher;
pub use models::{FetchReport, FetchedContent};
pub use resolver::RedirectResolver;
