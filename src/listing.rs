//! Story listings: today's front page and per-section pages.
//!
//! Listings are returned in page order. Story links are rewritten to proxy
//! URLs on the requesting origin so feed readers come back through this
//! service.
//!
//! # Sources
//!
//! | Listing | Page | Container |
//! |---------|------|-----------|
//! | Top stories | `/todayspaper/YYYY/MM/DD` | `div.stories-top div.story` |
//! | `world`, `nation` | `/news/<name>` | first `div.stories-top` |
//! | any other section | `/todayspaper/YYYY/MM/DD` | `div.tod-paper-section` whose heading contains the name |

use crate::error::Result;
use crate::extract::fix_image_url;
use crate::fetcher::{PageSource, fetch_listing};
use crate::models::StorySummary;
use crate::site::{SECONDARY_HOST, is_reserved_section, section_url};
use crate::urls::{RequestOrigin, encode};
use chrono::NaiveDate;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static STORIES_TOP: Lazy<Selector> = Lazy::new(|| selector("div.stories-top"));
static STORY: Lazy<Selector> = Lazy::new(|| selector("div.story"));
static TODAY_SECTION: Lazy<Selector> = Lazy::new(|| selector("div.tod-paper-section"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a"));
static H2: Lazy<Selector> = Lazy::new(|| selector("h2"));
static H3: Lazy<Selector> = Lazy::new(|| selector("h3"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("p"));
static IMAGE: Lazy<Selector> = Lazy::new(|| selector("img"));

/// Today's paper for `date`.
pub fn today_url(date: NaiveDate) -> String {
    format!("{}/todayspaper/{}", SECONDARY_HOST, date.format("%Y/%m/%d"))
}

/// Top stories of today's paper.
#[instrument(level = "info", skip(source, origin))]
pub async fn top_stories<S: PageSource>(
    source: &S,
    origin: &RequestOrigin,
    date: NaiveDate,
) -> Result<Vec<StorySummary>> {
    let html = fetch_listing(source, &today_url(date)).await?;
    let stories = parse_top_stories(&html, origin);
    info!(count = stories.len(), "Parsed top stories");
    Ok(stories)
}

/// Stories of one section, or `None` if no section matches `name`.
#[instrument(level = "info", skip(source, origin))]
pub async fn section<S: PageSource>(
    source: &S,
    origin: &RequestOrigin,
    name: &str,
    date: NaiveDate,
) -> Result<Option<Vec<StorySummary>>> {
    let stories = if is_reserved_section(name) {
        let html = fetch_listing(source, &section_url(name)).await?;
        Some(parse_section_page(&html, origin))
    } else {
        let html = fetch_listing(source, &today_url(date)).await?;
        parse_today_section(&html, name, origin)
    };
    match &stories {
        Some(found) => info!(count = found.len(), "Parsed section"),
        None => info!("No such section on today's paper"),
    }
    Ok(stories)
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn href_of(element: ElementRef<'_>) -> Option<&str> {
    element.value().attr("href")
}

/// Every `div.story` of the top-stories block with heading, link, summary
/// and optional lead image. Stories missing a heading or link are skipped.
pub fn parse_top_stories(html: &str, origin: &RequestOrigin) -> Vec<StorySummary> {
    let document = Html::parse_document(html);
    let Some(top) = document.select(&STORIES_TOP).next() else {
        warn!("Today's paper has no top-stories block");
        return Vec::new();
    };

    top.select(&STORY)
        .filter_map(|story| {
            let title = story.select(&H2).next().map(text_of)?;
            let href = story.select(&ANCHOR).next().and_then(href_of)?;
            let summary = story.select(&PARAGRAPH).map(|p| p.text().collect::<String>()).join("");
            let image = story
                .select(&IMAGE)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(fix_image_url);
            Some(StorySummary {
                title,
                url: encode(origin, href),
                summary: (!summary.trim().is_empty()).then_some(summary),
                image,
            })
        })
        .collect()
}

/// Title/link pairs from a dedicated section page.
pub fn parse_section_page(html: &str, origin: &RequestOrigin) -> Vec<StorySummary> {
    let document = Html::parse_document(html);
    let Some(top) = document.select(&STORIES_TOP).next() else {
        warn!("Section page has no top-stories block");
        return Vec::new();
    };

    top.select(&STORY)
        .filter_map(|story| {
            let anchor = story.select(&ANCHOR).next()?;
            let href = href_of(anchor)?;
            Some(StorySummary::link(text_of(anchor), encode(origin, href)))
        })
        .collect()
}

/// Stories from the section block of today's paper whose heading contains
/// `name`, ignoring case.
///
/// The markup is inconsistent: some stories are an anchor wrapping a heading,
/// others a heading wrapping an anchor. Both shapes are collected, anchors
/// first; elements that fit neither are skipped. The first match of each
/// shape is the section's own heading link and is dropped.
pub fn parse_today_section(
    html: &str,
    name: &str,
    origin: &RequestOrigin,
) -> Option<Vec<StorySummary>> {
    let document = Html::parse_document(html);
    let key = name.to_lowercase();
    let found = document.select(&TODAY_SECTION).find(|section| {
        section_heading(*section).is_some_and(|heading| heading.to_lowercase().contains(&key))
    })?;

    let anchors_with_heading = found.select(&ANCHOR).skip(1).filter_map(|anchor| {
        let heading = anchor.select(&H3).next()?;
        let href = href_of(anchor)?;
        Some(StorySummary::link(text_of(heading), encode(origin, href)))
    });
    let headings_with_anchor = found.select(&H3).skip(1).filter_map(|heading| {
        let href = heading.select(&ANCHOR).next().and_then(href_of)?;
        Some(StorySummary::link(text_of(heading), encode(origin, href)))
    });

    let stories: Vec<_> = anchors_with_heading.chain(headings_with_anchor).collect();
    debug!(count = stories.len(), "Collected section stories");
    Some(stories)
}

fn section_heading(section: ElementRef<'_>) -> Option<String> {
    let heading = section.select(&H2).next()?;
    heading.select(&ANCHOR).next().map(text_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::fake::FakeSite;
    use crate::urls::decode;

    fn origin() -> RequestOrigin {
        RequestOrigin::new("http://localhost:8080")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    const FRONT_PAGE: &str = r#"<html><body>
        <div class="stories-top">
          <div class="story"><h2>A</h2><a href="/a">read</a></div>
          <div class="story">
            <h2> B </h2><a href="/b">read</a>
            <p>First part. </p><p>Second part.</p>
            <img src="//arc-anglerfish-b.example/b.jpg">
          </div>
          <div class="story"><p>No heading, skipped</p><a href="/c">c</a></div>
        </div>
        <div class="tod-paper-section">
          <h2><a href="/metro">Metro</a></h2>
          <a href="/metro/1"><h3>Anchor wraps heading</h3></a>
          <h3><a href="/metro/2">Heading wraps anchor</a></h3>
          <a href="/metro/more">More</a>
        </div>
        <div class="tod-paper-section">
          <h2><a href="/business">Business</a></h2>
          <h3>Lead</h3>
          <h3><a href="https://www.bostonglobe.com/business/3">Deals</a></h3>
        </div>
    </body></html>"#;

    #[test]
    fn test_today_url() {
        assert_eq!(
            today_url(date()),
            "https://www3.bostonglobe.com/todayspaper/2024/03/07"
        );
    }

    #[test]
    fn test_top_stories_in_page_order() {
        let stories = parse_top_stories(FRONT_PAGE, &origin());
        assert_eq!(stories.len(), 2);
        assert_eq!(
            stories[0],
            StorySummary::link(
                "A",
                "http://localhost:8080/proxy/https%3A%2F%2Fwww3.bostonglobe.com%2Fa"
            )
        );
        assert_eq!(stories[1].title, "B");
        assert_eq!(
            decode(&origin(), &stories[1].url),
            "https://www3.bostonglobe.com/b"
        );
        assert_eq!(stories[1].summary.as_deref(), Some("First part. Second part."));
        assert_eq!(stories[1].image.as_deref(), Some("https://arc-anglerfish-b.example/b.jpg"));
    }

    #[test]
    fn test_top_stories_missing_block() {
        assert!(parse_top_stories("<html><body></body></html>", &origin()).is_empty());
    }

    #[test]
    fn test_today_section_collects_both_shapes() {
        let stories = parse_today_section(FRONT_PAGE, "METRO", &origin()).unwrap();
        let titles: Vec<_> = stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Anchor wraps heading", "Heading wraps anchor"]);
        assert_eq!(
            decode(&origin(), &stories[1].url),
            "https://www3.bostonglobe.com/metro/2"
        );
        assert!(stories.iter().all(|s| s.summary.is_none() && s.image.is_none()));
    }

    #[test]
    fn test_today_section_skips_unmatched_elements() {
        let stories = parse_today_section(FRONT_PAGE, "business", &origin()).unwrap();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].title, "Deals");
        assert_eq!(
            decode(&origin(), &stories[0].url),
            "https://www.bostonglobe.com/business/3"
        );
    }

    #[test]
    fn test_unknown_section_is_none() {
        assert_eq!(parse_today_section(FRONT_PAGE, "sports", &origin()), None);
    }

    #[test]
    fn test_section_page() {
        let html = r#"<div class="stories-top">
            <div class="story"><a href="/news/world/1">World one</a></div>
            <div class="story"><span>no link</span></div>
            <div class="story"><a href="/news/world/2">World two</a></div>
        </div>
        <div class="stories-top"><div class="story"><a href="/ignored">x</a></div></div>"#;
        let stories = parse_section_page(html, &origin());
        let titles: Vec<_> = stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["World one", "World two"]);
    }

    #[tokio::test]
    async fn test_top_stories_fetches_todays_paper() {
        let site = FakeSite::new().page(&today_url(date()), 200, FRONT_PAGE);
        let stories = top_stories(&site, &origin(), date()).await.unwrap();
        assert_eq!(stories.len(), 2);
        assert_eq!(site.rendered_calls(), 0);
    }

    #[tokio::test]
    async fn test_reserved_section_uses_section_page() {
        let html = r#"<div class="stories-top"><div class="story"><a href="/n/1">N</a></div></div>"#;
        let site = FakeSite::new().page(&section_url("nation"), 200, html);
        let stories = section(&site, &origin(), "nation", date()).await.unwrap();
        assert_eq!(stories.map(|s| s.len()), Some(1));
    }

    #[tokio::test]
    async fn test_section_from_todays_paper() {
        let site = FakeSite::new().page(&today_url(date()), 200, FRONT_PAGE);
        let metro = section(&site, &origin(), "metro", date()).await.unwrap();
        assert_eq!(metro.map(|s| s.len()), Some(2));
        let missing = section(&site, &origin(), "sports", date()).await.unwrap();
        assert!(missing.is_none());
    }
}
