//! Command-line interface definitions for Globe Feeds.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can also be provided through an environment variable, which
//! is the usual way to hand over the login credentials.

use crate::browser::BrowserSettings;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the Globe Feeds server.
///
/// # Examples
///
/// ```sh
/// # Credentials from the environment, default listen address
/// BOSTONGLOBE_USER=me@example.com BOSTONGLOBE_PASS=secret globe_feeds
///
/// # Public listener, shorter login wait, visible browser for debugging
/// globe_feeds --listen 0.0.0.0:9000 --settle-secs 5 --headful
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Subscriber login (email address)
    #[arg(long, env = "BOSTONGLOBE_USER")]
    pub user: Option<String>,

    /// Subscriber password
    #[arg(long, env = "BOSTONGLOBE_PASS", hide_env_values = true)]
    pub pass: Option<String>,

    /// Address the HTTP server binds to
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Seconds to wait after submitting the login form before reading cookies
    #[arg(long, env = "LOGIN_SETTLE_SECS", default_value_t = 10)]
    pub settle_secs: u64,

    /// Timeout in seconds for lightweight page fetches
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Number of extracted articles kept in memory
    #[arg(long, env = "ARTICLE_CACHE_CAPACITY", default_value_t = crate::cache::DEFAULT_CAPACITY)]
    pub cache_capacity: u64,

    /// Chrome/Chromium executable; probed from the usual locations if unset
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Run the browser with a visible window
    #[arg(long)]
    pub headful: bool,
}

impl Cli {
    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            headful: self.headful,
            executable: self.chrome_path.clone(),
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
