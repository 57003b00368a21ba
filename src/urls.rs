//! Mapping between canonical article URLs and proxy URLs.
//!
//! A proxy URL is the canonical URL, fully qualified and percent-encoded as a
//! single path segment under `/proxy/` on the origin serving the current
//! request:
//!
//! ```text
//! /a  ->  http://localhost:8080/proxy/https%3A%2F%2Fwww3.bostonglobe.com%2Fa
//! ```

use crate::site::{PRIMARY_DOMAIN, SECONDARY_HOST};
use axum::http::HeaderMap;
use axum::http::header::HOST;
use std::fmt;

const PROXY_PREFIX: &str = "/proxy/";

/// Scheme and host of the instance serving the current request, without a
/// trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin(String);

impl RequestOrigin {
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        Self(origin.trim_end_matches('/').to_string())
    }

    /// Build the origin from the `Host` and `X-Forwarded-Proto` headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let host = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        Self::new(format!("{}://{}", scheme, host))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn proxy_root(&self) -> String {
        format!("{}{}", self.as_str(), PROXY_PREFIX)
    }
}

impl fmt::Display for RequestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Qualify links that are not on the primary domain against the secondary
/// host. Those are host-relative paths only `www3` serves.
pub fn qualify(url: &str) -> String {
    if url.contains(PRIMARY_DOMAIN) {
        url.to_string()
    } else {
        format!("{}{}", SECONDARY_HOST, url)
    }
}

/// Turn a real article URL into a proxy URL on `origin`.
pub fn encode(origin: &RequestOrigin, url: &str) -> String {
    let qualified = qualify(url);
    format!("{}{}", origin.proxy_root(), urlencoding::encode(&qualified))
}

/// Recover the real URL from a proxy URL on `origin`.
///
/// Input without the proxy prefix is returned unchanged; callers treat it as
/// already canonical.
pub fn decode(origin: &RequestOrigin, url: &str) -> String {
    match url.strip_prefix(&origin.proxy_root()) {
        Some(encoded) => match urlencoding::decode(encoded) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => encoded.to_string(),
        },
        None => url.to_string(),
    }
}
