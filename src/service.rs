//! The three entry points the HTTP surface calls: top stories, a section,
//! and a single article.

use crate::cache::ArticleCache;
use crate::error::Result;
use crate::extract::extract_article;
use crate::fetcher::{PageSource, fetch_page};
use crate::links::proxy_article_links;
use crate::listing;
use crate::models::{Article, StorySummary};
use crate::urls::{RequestOrigin, decode};
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::{info, instrument};

/// Listing and article access over one authenticated [`PageSource`].
///
/// Constructed once at startup and shared by every request.
#[derive(Debug)]
pub struct GlobeReader<S> {
    source: S,
    cache: ArticleCache,
}

impl<S: PageSource> GlobeReader<S> {
    pub fn new(source: S, cache: ArticleCache) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &ArticleCache {
        &self.cache
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    pub async fn top_stories(&self, origin: &RequestOrigin) -> Result<Vec<StorySummary>> {
        listing::top_stories(&self.source, origin, Self::today()).await
    }

    /// `None` when today's paper has no section by that name.
    pub async fn section(
        &self,
        origin: &RequestOrigin,
        name: &str,
    ) -> Result<Option<Vec<StorySummary>>> {
        listing::section(&self.source, origin, name, Self::today()).await
    }

    /// The article behind a proxy URL or a canonical URL, with its in-article
    /// site links pointing at proxy URLs on `origin`.
    ///
    /// Extraction runs at most once per canonical URL at a time; later calls
    /// are answered from the cache without fetching. The cache holds the
    /// article as extracted, links are rewritten per request.
    #[instrument(level = "info", skip(self, origin))]
    pub async fn get_article(&self, origin: &RequestOrigin, url: &str) -> Result<Arc<Article>> {
        let canonical = decode(origin, url);
        let article = self
            .cache
            .get_or_extract(&canonical, async {
                let page = fetch_page(&self.source, &canonical).await?;
                let article = extract_article(&page);
                info!(
                    url = %canonical,
                    bytes = page.html().len(),
                    title = %article.title,
                    paragraphs = article.paragraphs.len(),
                    images = article.images.len(),
                    "Extracted article"
                );
                Ok(article)
            })
            .await?;
        Ok(Arc::new(proxy_article_links(&article, origin)))
    }
}
