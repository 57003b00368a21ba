//! Markup and URL conventions of the Boston Globe.
//!
//! Everything here is specific to one site and its two rendering paths:
//! the statically served pages on `www3`, which carry their article body as
//! an embedded `Fusion.globalContent` JSON blob, and the JavaScript-rendered
//! pages on `www` that only a real browser can produce.

/// Substring that marks a link as belonging to the primary domain.
pub const PRIMARY_DOMAIN: &str = "bostonglobe.com";

/// Host-relative links are only served from this host.
pub const SECONDARY_HOST: &str = "https://www3.bostonglobe.com";

/// Browsers are parked here before cookie injection.
pub const SITE_ROOT: &str = "https://www.bostonglobe.com";

pub const LOGIN_URL: &str = "https://pages.bostonglobe.com/login/";

pub const LOGIN_USER_FIELD: &str = "input[name='email']";
pub const LOGIN_PASS_FIELD: &str = "input[name='password']";
pub const LOGIN_SUBMIT: &str = "body > div > div > section > form > input";

pub const TITLE_SUFFIX: &str = " - The Boston Globe";

/// Author used whenever no structured author data can be recovered.
pub const FALLBACK_AUTHOR: &str = "BostonGlobe.com";

/// Script blocks containing this carry the embedded article data.
pub const EMBEDDED_MARKER: &str = "Fusion.globalContent";
pub const EMBEDDED_START: &str = r#"{"_id":"#;
pub const EMBEDDED_END: &str = ";Fusion.globalContentConfig";

/// Everything before this in an image URL is a resizing proxy.
pub const CDN_IMAGE_MARKER: &str = "arc-anglerfish";

/// Paragraph body handed out when the embedded data cannot be read.
pub const PLACEHOLDER_PARAGRAPH: &str = "Error loading article.";

/// Sections that have their own listing page instead of a block on today's paper.
pub const RESERVED_SECTIONS: [&str; 2] = ["world", "nation"];

pub const FEED_ID: &str = "https://bostonglobe.com/today";
pub const FEED_LINK: &str = "https://bostonglobe.com";
pub const FEED_SUBTITLE: &str = "Today's Boston Globe";

/// Listing page for one of [`RESERVED_SECTIONS`].
pub fn section_url(name: &str) -> String {
    format!("{}/news/{}", SECONDARY_HOST, name)
}

/// True when `name` has a dedicated listing page.
pub fn is_reserved_section(name: &str) -> bool {
    RESERVED_SECTIONS.contains(&name)
}
