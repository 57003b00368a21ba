//! Reader-friendly HTML for a proxied article.

use crate::error::Result;
use crate::models::Article;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;

fn write_text_element<W: Write>(
    w: &mut Writer<W>,
    start: BytesStart<'_>,
    text: &str,
) -> Result<()> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    w.write_event(Event::Start(start))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Render `article` as a standalone HTML page linking back to `source_url`.
///
/// Title, byline, captions and attributes are escaped here. Paragraphs are
/// written as-is and must come from [`crate::links::proxy_article_links`].
pub fn render_article(article: &Article, source_url: &str) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Start(BytesStart::new("html")))?;
    writer.write_event(Event::Start(BytesStart::new("head")))?;
    let mut charset = BytesStart::new("meta");
    charset.push_attribute(("charset", "utf-8"));
    writer.write_event(Event::Empty(charset))?;
    write_text_element(&mut writer, BytesStart::new("title"), &article.title)?;
    writer.write_event(Event::End(BytesEnd::new("head")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::Start(BytesStart::new("article")))?;
    write_text_element(&mut writer, BytesStart::new("h1"), &article.title)?;

    let mut byline = BytesStart::new("p");
    byline.push_attribute(("class", "byline"));
    write_text_element(&mut writer, byline, &article.metadata.author)?;

    for image in &article.images {
        writer.write_event(Event::Start(BytesStart::new("figure")))?;
        let mut img = BytesStart::new("img");
        img.push_attribute(("src", image.src.as_str()));
        img.push_attribute(("alt", image.alt.as_str()));
        writer.write_event(Event::Empty(img))?;
        if !image.alt.is_empty() {
            write_text_element(&mut writer, BytesStart::new("figcaption"), &image.alt)?;
        }
        writer.write_event(Event::End(BytesEnd::new("figure")))?;
    }

    // Paragraphs are markup already sanitized by the link rewriter.
    for paragraph in &article.paragraphs {
        writer.write_event(Event::Start(BytesStart::new("p")))?;
        writer.write_event(Event::Text(BytesText::from_escaped(paragraph.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new("p")))?;
    }

    writer.write_event(Event::Start(BytesStart::new("footer")))?;
    let mut source = BytesStart::new("a");
    source.push_attribute(("href", source_url));
    write_text_element(&mut writer, source, "Read on BostonGlobe.com")?;
    writer.write_event(Event::End(BytesEnd::new("footer")))?;

    writer.write_event(Event::End(BytesEnd::new("article")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("html")))?;

    let body = String::from_utf8_lossy(&writer.into_inner()).into_owned();
    Ok(format!("<!DOCTYPE html>\n{}\n", body))
}
