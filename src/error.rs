//! Crate-wide error type.
//!
//! Authentication and fetch failures propagate to the router. Extraction and
//! decode failures are recovered inside the extractor and only show up in
//! logs and degraded article fields.

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing credentials or a login form that could not be driven.
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The lightweight client got something other than 200 or 404.
    #[error("{url} answered with HTTP {status}")]
    Status { status: u16, url: String },

    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("could not configure browser: {0}")]
    Launch(String),

    #[error("expected markup not found: {0}")]
    Extraction(String),

    #[error("embedded data is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error produced by another caller's in-flight load of the same article.
    #[error(transparent)]
    Shared(#[from] Arc<Error>),
}

impl Error {
    /// Failures caused by the upstream site rather than by this process.
    pub fn is_upstream(&self) -> bool {
        match self {
            Error::Fetch(_) | Error::Status { .. } | Error::Browser(_) => true,
            Error::Shared(inner) => inner.is_upstream(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
