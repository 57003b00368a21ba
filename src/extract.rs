//! Article extraction from fetched markup.
//!
//! Two encodings of the same article exist:
//!
//! - **Light** pages embed the article as a `Fusion.globalContent` JSON blob
//!   in a script block. The blob contains raw HTML inside JSON strings with
//!   unescaped quotes, so it is repaired before parsing.
//! - **Rendered** pages (from the browser) have the body as plain paragraphs
//!   inside `div.article-content`.
//!
//! Title, images and metadata are read the same way from both. Extraction
//! never fails: missing structure degrades to a placeholder paragraph, an
//! empty title or the fallback author, and is logged.

use crate::error::{Error, Result};
use crate::fetcher::FetchedPage;
use crate::models::{Article, Image, Metadata};
use crate::site::{
    CDN_IMAGE_MARKER, EMBEDDED_END, EMBEDDED_MARKER, EMBEDDED_START, FALLBACK_AUTHOR,
    PLACEHOLDER_PARAGRAPH, TITLE_SUFFIX,
};
use crate::utils::{looks_truncated, truncate_for_log};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, instrument, warn};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static SCRIPT: Lazy<Selector> = Lazy::new(|| selector("script"));
static LINKED_DATA: Lazy<Selector> = Lazy::new(|| selector(r#"script[type="application/ld+json"]"#));
static FULL_WIDTH_IMAGE: Lazy<Selector> = Lazy::new(|| selector("img.width_full"));
static LEAD_MEDIA_IMAGE: Lazy<Selector> = Lazy::new(|| selector("img.lead-media__media"));
static ARTICLE_BODY: Lazy<Selector> = Lazy::new(|| selector("div.article-content"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("p"));

/// Extract an article, choosing the strategy by how the page was fetched.
pub fn extract_article(page: &FetchedPage) -> Article {
    match page {
        FetchedPage::Light(html) => extract_from_markup(&Html::parse_document(html)),
        FetchedPage::Rendered(html) => extract_from_rendered_dom(&Html::parse_document(html)),
    }
}

/// Embedded-data strategy for statically served pages.
#[instrument(level = "debug", skip_all)]
pub fn extract_from_markup(document: &Html) -> Article {
    let paragraphs = embedded_paragraphs(document).unwrap_or_else(|e| {
        warn!(error = %e, "Falling back to placeholder body");
        vec![PLACEHOLDER_PARAGRAPH.to_string()]
    });
    Article {
        title: parse_title(document),
        paragraphs,
        images: parse_images(document),
        metadata: parse_metadata(document),
    }
}

/// DOM strategy for browser-rendered pages.
#[instrument(level = "debug", skip_all)]
pub fn extract_from_rendered_dom(document: &Html) -> Article {
    let paragraphs = rendered_paragraphs(document).unwrap_or_else(|e| {
        warn!(error = %e, "Falling back to placeholder body");
        vec![PLACEHOLDER_PARAGRAPH.to_string()]
    });
    Article {
        title: parse_title(document),
        paragraphs,
        images: parse_images(document),
        metadata: parse_metadata(document),
    }
}

/// Document title without the site-name suffix.
pub fn parse_title(document: &Html) -> String {
    match document.select(&TITLE).next() {
        Some(title) => text_of(title).replace(TITLE_SUFFIX, "").trim().to_string(),
        None => {
            warn!("Page has no <title>");
            String::new()
        }
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Paragraphs from the embedded article blob: every content element of type
/// `text`, in order.
pub fn embedded_paragraphs(document: &Html) -> Result<Vec<String>> {
    let script = document
        .select(&SCRIPT)
        .map(text_of)
        .filter(|text| text.contains(EMBEDDED_MARKER))
        .last()
        .ok_or_else(|| Error::Extraction(format!("no script contains {}", EMBEDDED_MARKER)))?;

    let raw = embedded_json(&script)?;
    let repaired = repair_embedded_json(raw);
    let article: Value = serde_json::from_str(&repaired).map_err(|e| {
        warn!(
            error = %e,
            truncated = looks_truncated(&e),
            preview = %truncate_for_log(&repaired, 200),
            "Embedded article data did not parse"
        );
        Error::from(e)
    })?;

    let elements = article
        .get("content_elements")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Extraction("embedded data has no content_elements".to_string()))?;

    let paragraphs = elements
        .iter()
        .filter(|element| element.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|element| element.get("content").and_then(Value::as_str))
        .map(str::to_string)
        .collect::<Vec<_>>();
    debug!(count = paragraphs.len(), "Read embedded paragraphs");
    Ok(paragraphs)
}

/// The JSON object from its `{"_id":` opening up to the config assignment
/// that follows it.
fn embedded_json(script: &str) -> Result<&str> {
    let start = script
        .find(EMBEDDED_START)
        .ok_or_else(|| Error::Extraction(format!("embedded data has no {}", EMBEDDED_START)))?;
    let rest = &script[start..];
    let object = match rest.find(EMBEDDED_END) {
        Some(end) => &rest[..end],
        None => rest.trim_end().trim_end_matches(';'),
    };
    Ok(object)
}

/// Escape double quotes that sit inside `<...>` spans.
///
/// The embedded blob carries HTML such as `<a href="...">` inside JSON
/// strings without escaping its attribute quotes. Quotes outside tags, and
/// quotes that are already escaped, are left alone.
pub fn repair_embedded_json(raw: &str) -> String {
    let mut repaired = String::with_capacity(raw.len() + raw.len() / 32);
    let mut in_tag = false;
    let mut escaped = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            '"' if in_tag && !escaped => repaired.push('\\'),
            _ => {}
        }
        escaped = c == '\\' && !escaped;
        repaired.push(c);
    }
    repaired
}

fn rendered_paragraphs(document: &Html) -> Result<Vec<String>> {
    let body = document
        .select(&ARTICLE_BODY)
        .next()
        .ok_or_else(|| Error::Extraction("no div.article-content in rendered page".to_string()))?;
    Ok(body.select(&PARAGRAPH).map(text_of).collect())
}

/// Full-width images (lazy-loaded, `data-src`) followed by lead-media images
/// (`src`).
pub fn parse_images(document: &Html) -> Vec<Image> {
    let full_width = document
        .select(&FULL_WIDTH_IMAGE)
        .filter_map(|img| image_from(img, "data-src"));
    let lead_media = document
        .select(&LEAD_MEDIA_IMAGE)
        .filter_map(|img| image_from(img, "src"));
    full_width.chain(lead_media).collect()
}

fn image_from(img: ElementRef<'_>, source_attr: &str) -> Option<Image> {
    let element = img.value();
    let Some(src) = element.attr(source_attr) else {
        debug!(attr = source_attr, "Image without source attribute skipped");
        return None;
    };
    Some(Image {
        src: fix_image_url(src),
        alt: element.attr("alt").unwrap_or_default().to_string(),
    })
}

/// Make an image URL absolute `https://`, dropping any resizing-proxy prefix
/// in front of the CDN origin.
pub fn fix_image_url(url: &str) -> String {
    let mut fixed = match url.find(CDN_IMAGE_MARKER) {
        Some(index) => url[index..].to_string(),
        None => url.to_string(),
    };
    if fixed.starts_with("//") {
        fixed = format!("https:{}", fixed);
    }
    if !fixed.starts_with("https://") {
        fixed = format!("https://{}", fixed);
    }
    fixed
}

/// Linked-data metadata with `author` flattened to a display string.
pub fn parse_metadata(document: &Html) -> Metadata {
    let Some(script) = document.select(&LINKED_DATA).next() else {
        debug!("No linked data on page");
        return Metadata::default();
    };

    let mut fields = match serde_json::from_str::<Value>(text_of(script).trim()) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            warn!(kind = json_kind(&other), "Linked data is not an object");
            return Metadata::default();
        }
        Err(e) => {
            warn!(error = %e, "Linked data did not parse");
            return Metadata::default();
        }
    };

    let author = fields
        .remove("author")
        .as_ref()
        .and_then(author_names)
        .unwrap_or_else(|| FALLBACK_AUTHOR.to_string());
    Metadata {
        author,
        extra: fields,
    }
}

/// Accepts `{"name": "A"}`, `{"name": ["A", "B"]}`, `[{"name": "A"}, ...]`
/// and bare strings.
fn author_names(author: &Value) -> Option<String> {
    let names: Vec<&str> = match author {
        Value::String(name) => vec![name.as_str()],
        Value::Object(fields) => match fields.get("name")? {
            Value::String(name) => vec![name.as_str()],
            Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
            _ => return None,
        },
        Value::Array(authors) => authors
            .iter()
            .filter_map(|a| match a {
                Value::String(name) => Some(name.as_str()),
                Value::Object(fields) => fields.get("name").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        _ => return None,
    };

    let joined = names
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
