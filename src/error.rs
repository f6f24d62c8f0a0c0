//! Error types shared by the fetchers, extractors and backend client.
//!
//! Extraction failures are typed separately from transport failures so the
//! merger can drop a single candidate without treating it as a network fault.

use thiserror::Error;

/// Failure to turn fetched markup into an article or a list of links.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("required field `{0}` not found in page")]
    MissingField(&'static str),

    #[error("article body is empty")]
    EmptyBody,

    #[error("invalid selector `{0}`")]
    InvalidSelector(String),
}

/// Anything that can go wrong while crawling one page or talking to the backend.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Scripted failure raised by in-memory fakes.
    #[cfg(test)]
    #[error("fake failure: {0}")]
    Fake(String),
}
