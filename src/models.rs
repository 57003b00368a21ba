//! Data models shared by the extractors, the cache and the HTTP surface.
//!
//! - [`Article`]: one extracted article, keyed by its canonical URL
//! - [`Image`]: an article image with an absolute `https://` source
//! - [`Metadata`]: author plus whatever else the page's linked data carried
//! - [`StorySummary`]: one entry of a listing page, in page order

use crate::site::FALLBACK_AUTHOR;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A fully extracted article.
///
/// Produced once per fetch of one canonical URL and never modified
/// afterwards; the cache hands out shared references to it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    /// Page title with the site-name suffix removed.
    pub title: String,
    /// Body text, one entry per paragraph, in document order.
    pub paragraphs: Vec<String>,
    /// Full-width images first, then lead-media images.
    pub images: Vec<Image>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Image {
    pub src: String,
    pub alt: String,
}

/// Linked-data metadata of an article.
///
/// `author` is always populated, either from the page or with the site-wide
/// fallback. Every other key of the linked-data object is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Metadata {
    pub author: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    /// The plain-text description, if the page declared one.
    pub fn description(&self) -> Option<&str> {
        self.extra.get("description").and_then(Value::as_str)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            author: FALLBACK_AUTHOR.to_string(),
            extra: Map::new(),
        }
    }
}

/// One story of a listing page.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorySummary {
    pub title: String,
    /// Proxy URL pointing back into this service.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl StorySummary {
    /// A bare title/link pair, as found on section listings.
    pub fn link(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            summary: None,
            image: None,
        }
    }
}
