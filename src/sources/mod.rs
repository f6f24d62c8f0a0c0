//! Site-specific crawlers for Korean news sources.
//!
//! # Supported Sources
//!
//! | Source | Module | Discovery | Notes |
//! |--------|--------|-----------|-------|
//! | Daum keyword search | [`daum`] | Paginated search | Keywords and cursors from the backend |
//! | Daum finance-AI search | [`daum`] | Paginated search | Fixed keyword list, AI content filter |
//! | Daum main news | [`daum_main`] | Category headline pages | Six sections |
//! | AI Times | [`aitimes`] | Latest article listing | Lookback filter on listing dates |
//! | Boan News | [`boannews`] | Paged listing | Stops at the first article past the lookback |
//!
//! Extraction is split into pure functions over markup (tested against inline
//! fixtures) and thin async wrappers that fetch through a [`PageFetcher`].
//!
//! [`PageFetcher`]: crate::fetch::PageFetcher

use crate::error::{CrawlError, ExtractError};
use crate::fetch::{PageFetcher, fetch_image_base64};
use crate::models::ExtractedArticle;
use chrono::{DateTime, FixedOffset};
use scraper::{ElementRef, Selector};
use url::Url;

pub mod aitimes;
pub mod boannews;
pub mod daum;
pub mod daum_main;

/// Turns an article URL into extracted article fields.
pub trait ArticleSource {
    async fn fetch_article(&self, url: &str) -> Result<ExtractedArticle, CrawlError>;
}

/// Fields read from a content page, with the lead image still unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArticle {
    pub title: String,
    pub content: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub image_url: Option<String>,
}

impl ParsedArticle {
    /// Download the lead image, if any, and produce the final article.
    pub async fn finish<F: PageFetcher>(self, fetcher: &F, url: &str) -> ExtractedArticle {
        let thumbnail_image = match self.image_url.as_deref() {
            Some(image_url) => fetch_image_base64(fetcher, image_url).await,
            None => None,
        };
        ExtractedArticle {
            title: self.title,
            content: self.content,
            published_at: self.published_at,
            url: url.to_string(),
            thumbnail_image,
        }
    }
}

/// Parse a CSS selector, reporting failures as extraction errors.
pub(crate) fn css(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector(format!("{selector}: {e}")))
}

/// Trimmed text content of an element.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Trimmed text of the first match of `selector` under `root`, if non-empty.
pub(crate) fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Resolve a possibly relative `href` against `base`.
pub(crate) fn resolve_link(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(|url| url.to_string())
}

/// `src` of the first image under `root`, resolved against `base`.
pub(crate) fn first_image(
    root: ElementRef<'_>,
    base: &str,
) -> Result<Option<String>, ExtractError> {
    let img = css("img[src]")?;
    Ok(root
        .select(&img)
        .next()
        .and_then(|el| el.value().attr("src"))
        .and_then(|src| resolve_link(base, src)))
}
