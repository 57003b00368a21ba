//! Memoized article extraction.
//!
//! Keyed by canonical URL, bounded, least-recently-used eviction. Loads are
//! coalesced: while one caller extracts a URL, other callers for the same
//! URL wait for that result instead of fetching again. Failed loads are not
//! stored. Entries are never invalidated; a cached article reflects the page
//! as it was when first extracted.

use crate::error::{Error, Result};
use crate::models::Article;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default bound on cached articles.
pub const DEFAULT_CAPACITY: u64 = 128;

#[derive(Clone)]
pub struct ArticleCache {
    articles: Cache<String, Arc<Article>>,
}

impl ArticleCache {
    pub fn new(capacity: u64) -> Self {
        let articles = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { articles }
    }

    /// The cached article for `url`, if any.
    pub async fn get(&self, url: &str) -> Option<Arc<Article>> {
        self.articles.get(url).await
    }

    /// Return the cached article for `url`, running `load` only if it is
    /// neither cached nor already being loaded by another caller.
    #[instrument(level = "debug", skip(self, load))]
    pub async fn get_or_extract<F>(&self, url: &str, load: F) -> Result<Arc<Article>>
    where
        F: Future<Output = Result<Article>>,
    {
        if let Some(article) = self.get(url).await {
            debug!("Article cache hit");
            return Ok(article);
        }
        debug!("Article cache miss");
        self.articles
            .try_get_with(url.to_string(), async move { load.await.map(Arc::new) })
            .await
            .map_err(Error::Shared)
    }

    pub fn entry_count(&self) -> u64 {
        self.articles.entry_count()
    }

    /// Apply pending bookkeeping (evictions, counts) right away.
    #[cfg(test)]
    pub async fn sync(&self) {
        self.articles.run_pending_tasks().await;
    }
}

impl Default for ArticleCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for ArticleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleCache")
            .field("entries", &self.articles.entry_count())
            .field("capacity", &self.articles.policy().max_capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            paragraphs: vec!["p".to_string()],
            images: vec![],
            metadata: Metadata::default(),
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let cache = ArticleCache::default();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let got = cache
                .get_or_extract("https://x/a", async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(article("A"))
                })
                .await
                .unwrap();
            assert_eq!(got.title, "A");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.get("https://x/a").await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_loads_are_coalesced() {
        let cache = ArticleCache::default();
        let loads = AtomicUsize::new(0);
        let load = || async {
            loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(article("A"))
        };

        let (first, second) = tokio::join!(
            cache.get_or_extract("https://x/a", load()),
            cache.get_or_extract("https://x/a", load()),
        );
        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = ArticleCache::default();
        let failed = cache
            .get_or_extract("https://x/a", async {
                Err(Error::Status {
                    status: 500,
                    url: "https://x/a".to_string(),
                })
            })
            .await;
        assert!(matches!(failed, Err(Error::Shared(_))));
        assert!(failed.unwrap_err().is_upstream());

        let ok = cache.get_or_extract("https://x/a", async { Ok(article("A")) }).await;
        assert_eq!(ok.unwrap().title, "A");
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let cache = ArticleCache::new(2);
        for url in ["a", "b"] {
            cache.get_or_extract(url, async { Ok(article(url)) }).await.unwrap();
            cache.sync().await;
        }
        assert!(cache.get("a").await.is_some());
        cache.sync().await;
        cache.get_or_extract("c", async { Ok(article("c")) }).await.unwrap();
        cache.sync().await;

        assert_eq!(cache.entry_count(), 2);
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());
    }
}
