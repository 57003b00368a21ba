//! Rewriting of links inside article paragraphs.
//!
//! Paragraphs from the embedded data carry inline HTML. Before an article is
//! handed out, every link that points at the site is replaced by its proxy
//! URL so that following it stays inside this service. Links to other sites
//! are left as they are. The paragraph is re-serialized from the parsed
//! fragment, so the output is well-formed and all text is escaped; script
//! and style elements and inline event handlers are dropped.

use crate::models::Article;
use crate::site::PRIMARY_DOMAIN;
use crate::urls::{RequestOrigin, encode};
use quick_xml::escape::escape;
use scraper::{ElementRef, Html, Node};
use url::Url;

const VOID_ELEMENTS: [&str; 9] = ["area", "br", "col", "embed", "hr", "img", "input", "source", "wbr"];
const DROPPED_ELEMENTS: [&str; 2] = ["script", "style"];

/// Copy of `article` with every paragraph's site links proxied on `origin`.
pub fn proxy_article_links(article: &Article, origin: &RequestOrigin) -> Article {
    Article {
        title: article.title.clone(),
        paragraphs: article
            .paragraphs
            .iter()
            .map(|paragraph| proxy_links(paragraph, origin))
            .collect(),
        images: article.images.clone(),
        metadata: article.metadata.clone(),
    }
}

/// Rewrite the anchors of one HTML fragment.
pub fn proxy_links(fragment: &str, origin: &RequestOrigin) -> String {
    let html = Html::parse_fragment(fragment);
    let mut out = String::with_capacity(fragment.len());
    write_children(html.root_element(), origin, &mut out);
    out
}

/// Proxy URL for `href` if it points at the site, host-relative links
/// included.
fn proxy_href(origin: &RequestOrigin, href: &str) -> Option<String> {
    let href = href.trim();
    if href.starts_with('/') && !href.starts_with("//") {
        return Some(encode(origin, href));
    }
    let absolute = match href.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => href.to_string(),
    };
    let url = Url::parse(&absolute).ok()?;
    let on_site = matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some_and(|host| {
            host == PRIMARY_DOMAIN || host.ends_with(&format!(".{}", PRIMARY_DOMAIN))
        });
    on_site.then(|| encode(origin, &absolute))
}

fn write_children(parent: ElementRef<'_>, origin: &RequestOrigin, out: &mut String) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape(&**text)),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    write_element(element, origin, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, origin: &RequestOrigin, out: &mut String) {
    let name = element.value().name();
    if DROPPED_ELEMENTS.contains(&name) {
        return;
    }

    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        if attr.starts_with("on") {
            continue;
        }
        let value = match (name, attr) {
            ("a", "href") => proxy_href(origin, value).unwrap_or_else(|| value.to_string()),
            _ => value.to_string(),
        };
        out.push_str(&format!(" {}=\"{}\"", attr, escape(value.as_str())));
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }
    write_children(element, origin, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn origin() -> RequestOrigin {
        RequestOrigin::new("http://feeds.example")
    }

    #[test]
    fn test_site_links_are_proxied() {
        let out = proxy_links(
            r#"See <a href="https://www.bostonglobe.com/other">this</a>."#,
            &origin(),
        );
        assert_eq!(
            out,
            r#"See <a href="http://feeds.example/proxy/https%3A%2F%2Fwww.bostonglobe.com%2Fother">this</a>."#
        );
    }

    #[test]
    fn test_relative_and_protocol_relative_links() {
        let out = proxy_links(
            r#"<a href="/metro/x">x</a> <a href="//www3.bostonglobe.com/y">y</a>"#,
            &origin(),
        );
        assert!(out.contains(r#"href="http://feeds.example/proxy/https%3A%2F%2Fwww3.bostonglobe.com%2Fmetro%2Fx""#));
        assert!(out.contains(r#"href="http://feeds.example/proxy/https%3A%2F%2Fwww3.bostonglobe.com%2Fy""#));
    }

    #[test]
    fn test_foreign_links_are_untouched() {
        let fragment = r#"<a href="https://example.com/?q=bostonglobe.com">out</a> <a href="mailto:a@b.c">mail</a>"#;
        let out = proxy_links(fragment, &origin());
        assert!(out.contains(r#"href="https://example.com/?q=bostonglobe.com""#));
        assert!(out.contains(r#"href="mailto:a@b.c""#));
    }

    #[test]
    fn test_proxied_links_are_stable() {
        let once = proxy_links(r#"<a href="/a">a</a>"#, &origin());
        assert_eq!(proxy_links(&once, &origin()), once);
    }

    #[test]
    fn test_text_is_escaped_and_scripts_dropped() {
        let out = proxy_links(
            r#"a &lt; b <b onclick="steal()">bold</b><br><script>alert(1)</script>"#,
            &origin(),
        );
        assert_eq!(out, "a &lt; b <b>bold</b><br>");
    }

    #[test]
    fn test_article_keeps_other_fields() {
        let article = Article {
            title: "T".to_string(),
            paragraphs: vec!["plain".to_string(), r#"<a href="/z">z</a>"#.to_string()],
            images: vec![],
            metadata: Metadata::default(),
        };
        let proxied = proxy_article_links(&article, &origin());
        assert_eq!(proxied.title, "T");
        assert_eq!(proxied.paragraphs[0], "plain");
        assert!(proxied.paragraphs[1].starts_with(r#"<a href="http://feeds.example/proxy/"#));
        assert_eq!(proxied.metadata, article.metadata);
    }
}
