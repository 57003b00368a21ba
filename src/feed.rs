//! Atom feeds over story listings.
//!
//! Each listing becomes one Atom 1.0 document. Entries link to proxy URLs so
//! a reader following them comes back through this service. Where the
//! article behind a story can be resolved, its author and description are
//! added to the entry.

use crate::error::Result;
use crate::fetcher::PageSource;
use crate::models::StorySummary;
use crate::service::GlobeReader;
use crate::site::{FEED_ID, FEED_LINK, FEED_SUBTITLE};
use crate::urls::RequestOrigin;
use crate::utils::upcase;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::{StreamExt, stream};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;
use tracing::{info, instrument, warn};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Articles resolved at once while assembling a feed.
const FEED_CONCURRENCY: usize = 6;

pub fn top_stories_title() -> String {
    "Boston Globe - Top Stories".to_string()
}

pub fn section_title(name: &str) -> String {
    format!("Boston Globe - {}", upcase(name))
}

/// One `<entry>` of a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub summary: Option<String>,
}

impl From<StorySummary> for FeedEntry {
    fn from(story: StorySummary) -> Self {
        Self {
            title: story.title,
            url: story.url,
            author: None,
            summary: None,
        }
    }
}

/// Resolve every story's article and write the feed.
///
/// Stories are emitted in reverse listing order. A story whose article
/// cannot be resolved is still emitted, without author or summary.
#[instrument(level = "info", skip(reader, origin, stories), fields(stories = stories.len()))]
pub async fn build_feed<S: PageSource>(
    reader: &GlobeReader<S>,
    origin: &RequestOrigin,
    title: &str,
    stories: Vec<StorySummary>,
) -> Result<String> {
    let entries: Vec<FeedEntry> = stream::iter(stories.into_iter().rev())
        .map(|story| async move {
            let article = reader.get_article(origin, &story.url).await;
            let mut entry = FeedEntry::from(story);
            match article {
                Ok(article) => {
                    entry.author = Some(article.metadata.author.clone());
                    entry.summary = article.metadata.description().map(str::to_string);
                }
                Err(e) => warn!(url = %entry.url, error = %e, "Could not resolve article for feed entry"),
            }
            entry
        })
        .buffered(FEED_CONCURRENCY)
        .collect()
        .await;

    let resolved = entries.iter().filter(|e| e.author.is_some()).count();
    info!(entries = entries.len(), resolved, "Assembled feed");
    write_atom(title, &entries, Utc::now())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_link<W: Write>(w: &mut Writer<W>, href: &str) -> Result<()> {
    let mut link = BytesStart::new("link");
    link.push_attribute(("href", href));
    w.write_event(Event::Empty(link))?;
    Ok(())
}

/// Serialize a feed. All text and attribute values are escaped.
pub fn write_atom(title: &str, entries: &[FeedEntry], updated: DateTime<Utc>) -> Result<String> {
    let updated = timestamp(updated);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut feed = BytesStart::new("feed");
    feed.push_attribute(("xmlns", ATOM_NS));
    writer.write_event(Event::Start(feed))?;
    write_text_element(&mut writer, "id", FEED_ID)?;
    write_text_element(&mut writer, "title", title)?;
    write_link(&mut writer, FEED_LINK)?;
    write_text_element(&mut writer, "subtitle", FEED_SUBTITLE)?;
    write_text_element(&mut writer, "updated", &updated)?;

    for entry in entries {
        writer.write_event(Event::Start(BytesStart::new("entry")))?;
        write_text_element(&mut writer, "id", &entry.url)?;
        write_text_element(&mut writer, "title", &entry.title)?;
        write_link(&mut writer, &entry.url)?;
        write_text_element(&mut writer, "updated", &updated)?;
        if let Some(author) = &entry.author {
            writer.write_event(Event::Start(BytesStart::new("author")))?;
            write_text_element(&mut writer, "name", author)?;
            writer.write_event(Event::End(BytesEnd::new("author")))?;
        }
        if let Some(summary) = &entry.summary {
            write_text_element(&mut writer, "summary", summary)?;
        }
        writer.write_event(Event::End(BytesEnd::new("entry")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("feed")))?;
    let mut out = writer.into_inner();
    out.push(b'\n');
    Ok(String::from_utf8_lossy(&out).into_owned())
}
