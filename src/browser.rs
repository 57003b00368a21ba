//! Scriptable browser instances.
//!
//! Every instance is launched for one job (login or one rendered fetch) and
//! closed before the job's result is handed back. Dropping a handle without
//! calling [`BrowserHandle::close`] still kills the child process, but skips
//! the orderly shutdown.

use crate::error::{Error, Result};
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::{Stream, StreamExt};
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// How browser instances are launched. Captured once at startup and reused
/// for every instance opened with the session.
#[derive(Debug, Clone, Default)]
pub struct BrowserSettings {
    /// Show a window instead of running headless.
    pub headful: bool,
    /// Explicit executable; otherwise the usual install locations are probed.
    pub executable: Option<PathBuf>,
}

impl BrowserSettings {
    fn config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");
        if self.headful {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(Error::Launch)
    }
}

/// Poll the protocol handler until it ends, returning how many events it
/// produced. Event errors do not end the loop; commands stall once the
/// handler is no longer polled.
async fn drain_events<S: Stream + Unpin>(mut events: S) -> usize {
    let mut seen = 0;
    while events.next().await.is_some() {
        seen += 1;
    }
    debug!(events = seen, "Browser event stream ended");
    seen
}

/// A running browser plus the task draining its protocol events.
pub struct BrowserHandle {
    browser: Browser,
    events: JoinHandle<()>,
}

impl BrowserHandle {
    #[instrument(level = "debug", skip_all)]
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let (browser, mut handler) = Browser::launch(settings.config()?).await?;
        let events = tokio::spawn(async move {
            drain_events(handler).await;
        });
        debug!("Browser launched");
        Ok(Self { browser, events })
    }

    pub async fn new_page(&self, url: &str) -> Result<Page> {
        Ok(self.browser.new_page(url).await?)
    }

    /// Shut the browser down. Failures are logged, never returned, so that
    /// callers can close unconditionally on every exit path.
    #[instrument(level = "debug", skip_all)]
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Browser did not close cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Waiting for browser exit failed");
        }
        self.events.abort();
        debug!("Browser closed");
    }
}
