//! Authenticated page retrieval.
//!
//! Pages are fetched with the lightweight cookie-bearing client first. The
//! site answers 404 to that client for pages that only exist after
//! client-side rendering; those are fetched again through a fresh logged-in
//! browser. Which path produced the markup travels with it as a
//! [`FetchedPage`] so the extractor never has to guess.

use crate::browser::BrowserHandle;
use crate::error::{Error, Result};
use crate::session::Session;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Markup together with the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedPage {
    /// Served directly; carries the embedded article data.
    Light(String),
    /// Serialized DOM of a browser-rendered page.
    Rendered(String),
}

impl FetchedPage {
    pub fn html(&self) -> &str {
        match self {
            FetchedPage::Light(html) | FetchedPage::Rendered(html) => html,
        }
    }
}

/// Something that can fetch pages on the site with the session applied.
pub trait PageSource: Send + Sync {
    /// GET through the lightweight client. Any status is returned as-is.
    fn fetch_light(&self, url: &str) -> impl Future<Output = Result<(u16, String)>> + Send;

    /// Render the page in a browser and return the serialized DOM.
    fn fetch_rendered(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

/// [`PageSource`] backed by the logged-in [`Session`].
#[derive(Debug, Clone)]
pub struct SessionFetcher {
    client: reqwest::Client,
    session: Arc<Session>,
}

impl SessionFetcher {
    pub fn new(session: Arc<Session>, timeout: Duration) -> Result<Self> {
        let client = session.http_client(timeout)?;
        Ok(Self { client, session })
    }

    async fn render(&self, browser: &BrowserHandle, url: &str) -> Result<String> {
        let page = self.session.seed_page(browser).await?;
        page.goto(url).await?;
        Ok(page.content().await?)
    }
}

impl PageSource for SessionFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_light(&self, url: &str) -> Result<(u16, String)> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "Fetched page");
        Ok((status, body))
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_rendered(&self, url: &str) -> Result<String> {
        let browser = BrowserHandle::launch(self.session.browser_settings()).await?;
        let result = self.render(&browser, url).await;
        browser.close().await;

        let html = result?;
        debug!(bytes = html.len(), "Rendered page");
        Ok(html)
    }
}

/// Fetch an article page, escalating to the browser on 404.
///
/// 200 yields [`FetchedPage::Light`], 404 yields [`FetchedPage::Rendered`],
/// any other status is an [`Error::Status`]. Nothing is retried.
#[instrument(level = "info", skip(source))]
pub async fn fetch_page<S: PageSource>(source: &S, url: &str) -> Result<FetchedPage> {
    let (status, body) = source.fetch_light(url).await?;
    match status {
        200 => Ok(FetchedPage::Light(body)),
        404 => {
            info!("Lightweight fetch got 404; rendering in browser");
            Ok(FetchedPage::Rendered(source.fetch_rendered(url).await?))
        }
        status => Err(Error::Status {
            status,
            url: url.to_string(),
        }),
    }
}

/// Fetch a listing page. Listings never need the browser; only 200 counts.
#[instrument(level = "info", skip(source))]
pub async fn fetch_listing<S: PageSource>(source: &S, url: &str) -> Result<String> {
    match source.fetch_light(url).await? {
        (200, body) => Ok(body),
        (status, _) => Err(Error::Status {
            status,
            url: url.to_string(),
        }),
    }
}
