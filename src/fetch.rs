//! Outbound page and image fetching with a politeness delay.
//!
//! Every request made through [`HttpFetcher`] is preceded by a random pause
//! drawn from [`RequestDelay`] to stay under the news sites' rate limits. The
//! pause is the only throttling; failed requests are not retried.

use crate::error::CrawlError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::{Rng, rng};
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Desktop browser identity sent to every news site.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) ",
    "Chrome/91.0.4472.124 Safari/537.36"
);

/// Something that can download pages and binary assets.
///
/// Implementations report a non-2xx answer as [`CrawlError::Status`] so
/// callers never parse an error page as content.
pub trait PageFetcher {
    /// Body of `url` decoded as text.
    async fn fetch_text(&self, url: &str) -> Result<String, CrawlError>;
    /// Raw body of `url`, for images.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CrawlError>;
}

/// Bounds of the random pause taken before each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDelay {
    pub min: Duration,
    pub max: Duration,
}

impl RequestDelay {
    /// Bounds in either order; the smaller one becomes `min`.
    pub fn new(min: Duration, max: Duration) -> Self {
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    /// No pause at all.
    #[cfg(test)]
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draw one pause uniformly from `[min, max]`.
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let (min, max) = (self.min.as_millis() as u64, self.max.as_millis() as u64);
        Duration::from_millis(rng().random_range(min..=max))
    }
}

impl Default for RequestDelay {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(3))
    }
}

/// [`PageFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    delay: RequestDelay,
}

impl HttpFetcher {
    /// Fetcher sending `user_agent` and pausing for `delay` before each request.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Config`] if `user_agent` is not a valid header
    /// value, or [`CrawlError::Http`] if the client cannot be built.
    pub fn new(user_agent: &str, delay: RequestDelay) -> Result<Self, CrawlError> {
        Self::build(user_agent, delay, false)
    }

    /// Fetcher that skips TLS certificate verification, for sites serving
    /// broken certificate chains.
    pub fn insecure(user_agent: &str, delay: RequestDelay) -> Result<Self, CrawlError> {
        Self::build(user_agent, delay, true)
    }

    fn build(
        user_agent: &str,
        delay: RequestDelay,
        accept_invalid_certs: bool,
    ) -> Result<Self, CrawlError> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(user_agent)
            .map_err(|e| CrawlError::Config(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ko-KR,ko;q=0.9,en-US;q=0.8"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self { client, delay })
    }

    async fn pause(&self) {
        let delay = self.delay.sample();
        if !delay.is_zero() {
            debug!(?delay, "Pausing before request");
            sleep(delay).await;
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, CrawlError> {
        self.pause().await;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_text(&self, url: &str) -> Result<String, CrawlError> {
        let body = self.get(url).await?.text().await?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CrawlError> {
        let bytes = self.get(url).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Download an image and encode it as base64.
///
/// # Returns
///
/// Standard-alphabet base64 of the image bytes, or `None` if the download
/// failed. Failures are logged; a missing image never drops the article it
/// belongs to.
pub async fn fetch_image_base64<F: PageFetcher>(fetcher: &F, image_url: &str) -> Option<String> {
    match fetcher.fetch_bytes(image_url).await {
        Ok(bytes) => Some(STANDARD.encode(bytes)),
        Err(e) => {
            warn!(
                %image_url,
                error = %e,
                "Image download failed; continuing without thumbnail"
            );
            None
        }
    }
}
