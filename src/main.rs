//! # news_fetcher
//!
//! Resolve one news link to its publisher URL, fetch the article and write it
//! as a JSON report.
//!
//! ## Usage
//!
//! ```sh
//! news_fetcher "https://news.google.com/rss/articles/CBMi..." -o output.json
//! ```

use clap::Parser;
use news_fetcher::outputs::json;
use news_fetcher::{FetchReport, FetcherConfig, NewsContentFetcher, load_config};
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::Cli;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_fetcher starting up");

    let args = Cli::parse();
    debug!(url = %args.url, output = %args.output.display(), "Parsed CLI arguments");

    let base = match &args.config {
        Some(path) => load_config(path)?,
        None => FetcherConfig::default(),
    };
    let config = args.apply(base);
    let fetcher = NewsContentFetcher::new(config);

    let written = if args.resolve_only {
        let resolved = fetcher.resolver().resolve(&args.url).await;
        info!(original = %args.url, %resolved, "Resolution complete");
        println!("{resolved}");
        Ok(())
    } else {
        match fetcher.fetch(&args.url, args.query.as_deref()).await {
            Some(content) => {
                info!(
                    final_url = %content.final_url,
                    raw_len = content.markdown_raw.len(),
                    filtered_len = content.markdown_filtered.len(),
                    "Fetched article"
                );
                let report = FetchReport::new(&args.url, args.query.as_deref(), content);
                json::write_report(&report, &args.output).await
            }
            None => {
                warn!(url = %args.url, "No content fetched; nothing written");
                Ok(())
            }
        }
    };

    fetcher.shutdown().await;
    written?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
