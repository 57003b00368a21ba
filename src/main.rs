//! # Globe Feeds
//!
//! Re-serves the Boston Globe's daily paper as Atom feeds for a single
//! subscriber, with a proxy that shows the full text of each article.
//!
//! ## Features
//!
//! - Logs in once at startup through a headless browser and reuses the
//!   session cookies for every later request
//! - Fetches article pages with a lightweight HTTP client, falling back to a
//!   freshly logged-in browser for pages that only exist after rendering
//! - Extracts title, body, images and author from either kind of page
//! - Serves today's top stories and any section of today's paper as Atom
//! - Caches extracted articles in memory, one extraction per URL at a time
//!
//! ## Usage
//!
//! ```sh
//! BOSTONGLOBE_USER=me@example.com BOSTONGLOBE_PASS=secret globe_feeds --listen 0.0.0.0:8080
//! ```
//!
//! ## Architecture
//!
//! 1. **Session**: Log in, capture cookies, build the cookie-bearing client
//! 2. **Fetching**: Lightweight GET, browser render on 404
//! 3. **Extraction**: Embedded JSON or rendered DOM into an [`models::Article`]
//! 4. **Serving**: Listings become feeds whose links point back at `/proxy/`

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cache;
mod cli;
mod error;
mod extract;
mod feed;
mod fetcher;
mod links;
mod listing;
mod models;
mod render;
mod server;
mod service;
mod session;
mod site;
mod urls;
mod utils;

use cache::ArticleCache;
use cli::Cli;
use fetcher::SessionFetcher;
use service::GlobeReader;
use session::{Credentials, authenticate};

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

    info!("globe_feeds starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(listen = %args.listen, settle_secs = args.settle_secs, "Parsed CLI arguments");

    // ---- Log in once ----
    let credentials = Credentials::new(args.user.clone(), args.pass.clone())?;
    let start_time = std::time::Instant::now();
    let session = authenticate(&credentials, args.browser_settings(), args.settle()).await?;
    info!(
        cookies = session.cookies().len(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Logged in"
    );

    // ---- Serve ----
    let fetcher = SessionFetcher::new(Arc::new(session), args.http_timeout())?;
    let reader = Arc::new(GlobeReader::new(
        fetcher,
        ArticleCache::new(args.cache_capacity),
    ));
    server::serve(args.listen, reader).await?;

    info!("globe_feeds stopped");
    Ok(())
}
