//! AI Times: latest article listing, filtered to the lookback window.
//!
//! The listing already carries title and publish time, so only items published
//! at or after the window start are opened to read the body and lead image.
//! There is no upper bound, so an item stamped a few minutes past the run
//! start is still collected.

use super::{ParsedArticle, css, first_image, first_text, resolve_link};
use crate::error::{CrawlError, ExtractError};
use crate::fetch::PageFetcher;
use crate::merge::{ArticleMerger, MergeTally, Origin};
use crate::models::ExtractedArticle;
use crate::utils::parse_seoul_datetime;
use crate::window::SearchWindow;
use chrono::{DateTime, FixedOffset};
use scraper::Html;
use tracing::{debug, info, instrument, warn};

pub const BASE_URL: &str = "https://www.aitimes.com";
pub const LIST_URL: &str = "https://www.aitimes.com/news/articleList.html?view_type=sm";
pub const TAG: &str = "AI";
const DATE_FORMAT: &str = "%Y.%m.%d %H:%M";

/// One entry of the article listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingItem {
    pub url: String,
    pub title: String,
    pub published_at: Option<DateTime<FixedOffset>>,
}

/// Entries of the listing page. Items without a title link are skipped.
pub fn parse_listing(html: &str) -> Result<Vec<ListingItem>, ExtractError> {
    let document = Html::parse_document(html);
    let item = css("section#section-list li")?;
    let heading = css("h4.titles")?;
    let link = css("h4.titles a[href]")?;
    let byline = css("span.byline em")?;

    Ok(document
        .select(&item)
        .filter_map(|li| {
            let title = first_text(li, &heading)?;
            let url = li
                .select(&link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve_link(BASE_URL, href))?;
            let published_at = li
                .select(&byline)
                .nth(1)
                .map(super::element_text)
                .and_then(|raw| parse_seoul_datetime(&raw, DATE_FORMAT));
            Some(ListingItem { url, title, published_at })
        })
        .collect())
}

/// Body text and lead image of an article page.
pub fn parse_article(html: &str, item: &ListingItem) -> Result<ParsedArticle, ExtractError> {
    let document = Html::parse_document(html);
    let body = document
        .select(&css("#article-view-content-div")?)
        .next()
        .ok_or(ExtractError::MissingField("article-view-content-div"))?;
    let content = super::element_text(body);
    if content.is_empty() {
        return Err(ExtractError::EmptyBody);
    }
    Ok(ParsedArticle {
        title: item.title.clone(),
        content,
        published_at: item.published_at,
        image_url: first_image(body, &item.url)?,
    })
}

async fn fetch_article<F: PageFetcher>(
    fetcher: &F,
    item: &ListingItem,
) -> Result<ExtractedArticle, CrawlError> {
    let html = fetcher.fetch_text(&item.url).await?;
    let parsed = parse_article(&html, item)?;
    Ok(parsed.finish(fetcher, &item.url).await)
}

/// Crawl the listing into `merger`, opening only items published at or after
/// `window.start`.
///
/// # Returns
///
/// The number of listing items that were recent enough to open.
///
/// # Errors
///
/// Returns an error if the listing page cannot be fetched or parsed. Failures
/// on individual articles are logged and dropped.
#[instrument(level = "info", skip_all)]
pub async fn collect<F: PageFetcher>(
    fetcher: &F,
    window: &SearchWindow,
    merger: &mut ArticleMerger,
) -> Result<usize, CrawlError> {
    let html = fetcher.fetch_text(LIST_URL).await?;
    let items = parse_listing(&html)?;
    info!(count = items.len(), "Parsed AI Times listing");

    let origin = Origin::category(TAG);
    let mut in_window = 0;
    let mut merged = MergeTally::default();
    for item in &items {
        match item.published_at {
            Some(at) if at >= window.start => {
                in_window += 1;
                let outcome = merger.merge(&item.url, &origin, || fetch_article(fetcher, item));
                merged.record(outcome.await);
            }
            Some(at) => debug!(url = %item.url, published_at = %at, "Older than lookback window"),
            None => warn!(url = %item.url, "Listing date missing; skipping"),
        }
    }
    info!(
        opened = in_window,
        added = merged.inserted,
        dropped = merged.dropped,
        "AI Times listing crawled"
    );
    Ok(in_window)
}
