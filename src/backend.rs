//! HTTP client for the news backend.
//!
//! The backend plays three roles for a crawl run, each behind its own trait so
//! the orchestrator can be driven by in-memory fakes:
//! - [`KeywordSource`]: the keywords to crawl and their cursors
//! - [`CursorSink`]: receives advanced cursors after each keyword
//! - [`IngestionSink`]: receives the deduplicated article batch
//!
//! # Endpoints
//!
//! | Role | Method | Path |
//! |------|--------|------|
//! | Keyword source | `GET` | `/api/public/keywords` |
//! | Cursor sink | `PUT` | `/api/public/keywords/last-crawled-dt` |
//! | Ingestion sink | `POST` | `/api/public/news` |
//!
//! None of the calls are retried. Every call gives up after
//! [`REQUEST_TIMEOUT`], so a stalled backend fails the run instead of hanging
//! the scheduler.

use crate::error::CrawlError;
use crate::models::{ArticleRecord, CursorUpdate, KeywordCursor};
use crate::utils::{parse_backend_timestamp, truncate_for_log};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Time allowed to open a connection to the backend.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Time allowed for a whole backend request, body included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads the keywords to crawl.
pub trait KeywordSource {
    async fn fetch_keywords(&self) -> Result<Vec<KeywordCursor>, CrawlError>;
}

/// Persists advanced keyword cursors. Resending the same value is harmless.
pub trait CursorSink {
    async fn update_cursors(&self, updates: &[CursorUpdate]) -> Result<(), CrawlError>;
}

/// Accepts one batch of normalized articles.
pub trait IngestionSink {
    async fn send_articles(&self, articles: &[ArticleRecord]) -> Result<(), CrawlError>;
}

/// Cursor sink for runs that do not track cursors.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCursorUpdates;

impl CursorSink for NoCursorUpdates {
    async fn update_cursors(&self, _updates: &[CursorUpdate]) -> Result<(), CrawlError> {
        Ok(())
    }
}

/// One entry of the keyword listing, as the backend spells it.
#[derive(Debug, Deserialize)]
struct KeywordEntry {
    keyword: String,
    #[serde(rename = "lastCrawledAt")]
    last_crawled_at: Option<String>,
}

impl From<KeywordEntry> for KeywordCursor {
    fn from(entry: KeywordEntry) -> Self {
        let last_crawled_at = entry.last_crawled_at.as_deref().and_then(|raw| {
            let parsed = parse_backend_timestamp(raw);
            if parsed.is_none() {
                warn!(
                    keyword = %entry.keyword,
                    raw,
                    "Unparseable lastCrawledAt; treating cursor as absent"
                );
            }
            parsed
        });
        KeywordCursor {
            keyword: entry.keyword,
            last_crawled_at,
        }
    }
}

/// Decode the keyword listing body.
pub fn parse_keywords(body: &str) -> Result<Vec<KeywordCursor>, CrawlError> {
    let entries: Vec<KeywordEntry> = serde_json::from_str(body)?;
    Ok(entries.into_iter().map(KeywordCursor::from).collect())
}

/// Backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Client for the backend at `base_url` with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidUrl`] if `base_url` does not parse, or
    /// [`CrawlError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, CrawlError> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    /// Like [`BackendClient::new`], with `timeout` as the whole-request limit.
    /// The connect limit is the smaller of `timeout` and [`CONNECT_TIMEOUT`].
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, CrawlError> {
        let base_url = base_url.trim_end_matches('/');
        Url::parse(base_url).map_err(|e| CrawlError::InvalidUrl(format!("{base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<String, CrawlError> {
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(
                %url,
                status = status.as_u16(),
                body = %truncate_for_log(&body, 300),
                "Backend rejected request"
            );
            return Err(CrawlError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(body)
    }
}

impl KeywordSource for BackendClient {
    #[instrument(level = "info", skip_all)]
    async fn fetch_keywords(&self) -> Result<Vec<KeywordCursor>, CrawlError> {
        let t0 = Instant::now();
        let response = self.client.get(self.endpoint("/api/public/keywords")).send().await?;
        let body = Self::check(response).await?;
        let cursors = parse_keywords(&body)?;
        info!(
            count = cursors.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched keywords from backend"
        );
        debug!(?cursors, "Keyword cursors");
        Ok(cursors)
    }
}

impl CursorSink for BackendClient {
    #[instrument(level = "info", skip_all, fields(count = updates.len()))]
    async fn update_cursors(&self, updates: &[CursorUpdate]) -> Result<(), CrawlError> {
        let response = self
            .client
            .put(self.endpoint("/api/public/keywords/last-crawled-dt"))
            .json(updates)
            .send()
            .await?;
        let body = Self::check(response).await?;
        info!(response = %truncate_for_log(&body, 200), "Updated last crawled times");
        Ok(())
    }
}

impl IngestionSink for BackendClient {
    #[instrument(level = "info", skip_all, fields(count = articles.len()))]
    async fn send_articles(&self, articles: &[ArticleRecord]) -> Result<(), CrawlError> {
        let t0 = Instant::now();
        let response = self
            .client
            .post(self.endpoint("/api/public/news"))
            .json(articles)
            .send()
            .await?;
        let body = Self::check(response).await?;
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            response = %truncate_for_log(&body, 200),
            "Sent articles to backend"
        );
        Ok(())
    }
}
