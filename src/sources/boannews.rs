//! Boan News: paged listing walked newest first until the lookback floor.
//!
//! The listing is ordered by publish time, so the first entry older than the
//! window ends the whole walk. The site serves an incomplete certificate
//! chain; the caller is expected to hand in a fetcher that tolerates it.

use super::{ParsedArticle, css, element_text, first_image, first_text, resolve_link};
use crate::error::{CrawlError, ExtractError};
use crate::fetch::PageFetcher;
use crate::merge::{ArticleMerger, MergeTally, Origin};
use crate::models::ExtractedArticle;
use crate::utils::parse_seoul_datetime;
use crate::window::SearchWindow;
use chrono::{DateTime, FixedOffset};
use scraper::Html;
use tracing::{debug, error, info, instrument};

pub const BASE_URL: &str = "https://boannews.com";
pub const TAG: &str = "보안";
pub const MAX_PAGES: u32 = 4;
const DATE_FORMAT: &str = "%Y년 %m월 %d일 %H:%M";

/// Listing page `page` (1-based), newest articles on page 1.
pub fn list_url(page: u32) -> String {
    format!("{BASE_URL}/media/t_list.asp?page={page}")
}

/// One entry of a listing page. Fields that could not be read are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingItem {
    pub url: Option<String>,
    pub title: Option<String>,
    pub published_at: Option<DateTime<FixedOffset>>,
}

/// Entries of one listing page, newest first.
pub fn parse_listing(html: &str) -> Result<Vec<ListingItem>, ExtractError> {
    let document = Html::parse_document(html);
    let item = css(".news_list")?;
    let writer = css(".news_writer")?;
    let link = css("a[href]")?;
    let heading = css(".news_txt")?;

    Ok(document
        .select(&item)
        .map(|entry| {
            // "조재호 기자 | 2024년 11월 11일 20:28"
            let published_at = first_text(entry, &writer).and_then(|byline| {
                let raw = byline.rsplit('|').next().unwrap_or_default().to_string();
                parse_seoul_datetime(&raw, DATE_FORMAT)
            });
            let url = entry
                .select(&link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve_link(BASE_URL, href));
            ListingItem {
                url,
                title: first_text(entry, &heading),
                published_at,
            }
        })
        .collect())
}

/// Body text and lead image of an article page.
///
/// # Arguments
///
/// * `html` - The article page
/// * `url` - Page URL, used to resolve a relative image path
/// * `title` - Title from the listing entry
/// * `published_at` - Publish time from the listing entry
///
/// # Errors
///
/// Returns [`ExtractError::MissingField`] without a `#news_content` element
/// and [`ExtractError::EmptyBody`] when it has no text.
pub fn parse_article(
    html: &str,
    url: &str,
    title: &str,
    published_at: DateTime<FixedOffset>,
) -> Result<ParsedArticle, ExtractError> {
    let document = Html::parse_document(html);
    let body = document
        .select(&css("#news_content")?)
        .next()
        .ok_or(ExtractError::MissingField("news_content"))?;
    let content = element_text(body);
    if content.is_empty() {
        return Err(ExtractError::EmptyBody);
    }
    Ok(ParsedArticle {
        title: title.to_string(),
        content,
        published_at: Some(published_at),
        image_url: first_image(body, url)?,
    })
}

async fn fetch_article<F: PageFetcher>(
    fetcher: &F,
    url: &str,
    title: &str,
    published_at: DateTime<FixedOffset>,
) -> Result<ExtractedArticle, CrawlError> {
    let html = fetcher.fetch_text(url).await?;
    let parsed = parse_article(&html, url, title, published_at)?;
    Ok(parsed.finish(fetcher, url).await)
}

/// Walk listing pages into `merger` until an entry falls before the window.
///
/// # Returns
///
/// The number of listing pages that loaded. A page that fails is logged and
/// skipped; the walk continues with the next one.
#[instrument(level = "info", skip_all, fields(max_pages = max_pages))]
pub async fn collect<F: PageFetcher>(
    fetcher: &F,
    window: &SearchWindow,
    max_pages: u32,
    merger: &mut ArticleMerger,
) -> usize {
    let origin = Origin::category(TAG);
    let mut pages_loaded = 0;
    let mut merged = MergeTally::default();

    'pages: for page in 1..=max_pages {
        let items = match fetcher.fetch_text(&list_url(page)).await {
            Ok(html) => parse_listing(&html).map_err(CrawlError::from),
            Err(e) => Err(e),
        };
        let items = match items {
            Ok(items) => items,
            Err(e) => {
                error!(page, error = %e, "Listing page failed; moving on");
                continue;
            }
        };
        pages_loaded += 1;

        for item in &items {
            let Some(published_at) = item.published_at else {
                debug!(page, url = ?item.url, "Entry without readable date; skipping");
                continue;
            };
            if published_at < window.start {
                info!(page, %published_at, "Reached entries older than the window");
                break 'pages;
            }
            let (Some(url), Some(title)) = (item.url.as_deref(), item.title.as_deref()) else {
                debug!(page, "Entry without link or title; skipping");
                continue;
            };
            let outcome = merger
                .merge(url, &origin, || fetch_article(fetcher, url, title, published_at))
                .await;
            merged.record(outcome);
        }
    }
    info!(
        pages = pages_loaded,
        added = merged.inserted,
        dropped = merged.dropped,
        "Boan News listing crawled"
    );
    pages_loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeWeb;
    use crate::utils::seoul;
    use chrono::{Duration, TimeZone};

    fn entry(idx: u32, title: &str, date: &str) -> String {
        format!(
            r#"<div class="news_list">
                 <a href="/media/view.asp?idx={idx}"><span class="news_txt">{title}</span></a>
                 <span class="news_writer">조재호 기자 | {date}</span>
               </div>"#
        )
    }

    fn article_page(text: &str) -> String {
        format!(r#"<div id="news_content"><img src="/media/upimages/{text}.jpg">{text}</div>"#)
    }

    fn window() -> SearchWindow {
        let now = seoul().with_ymd_and_hms(2024, 11, 11, 21, 0, 0).unwrap();
        SearchWindow::lookback_from(now, Duration::hours(24))
    }

    #[test]
    fn test_parse_listing_entry() {
        let html = entry(7, "랜섬웨어 공격 급증", "2024년 11월 11일 20:28");
        let items = parse_listing(&html).unwrap();
        assert_eq!(
            items,
            vec![ListingItem {
                url: Some("https://boannews.com/media/view.asp?idx=7".to_string()),
                title: Some("랜섬웨어 공격 급증".to_string()),
                published_at: Some(seoul().with_ymd_and_hms(2024, 11, 11, 20, 28, 0).unwrap()),
            }]
        );
    }

    #[test]
    fn test_parse_article_missing_body() {
        let at = seoul().with_ymd_and_hms(2024, 11, 11, 20, 28, 0).unwrap();
        assert_eq!(
            parse_article("<div>없음</div>", "https://boannews.com/media/view.asp?idx=1", "t", at),
            Err(ExtractError::MissingField("news_content"))
        );
    }

    #[tokio::test]
    async fn test_collect_stops_at_first_old_entry() {
        let page1 = [
            entry(3, "최신 기사", "2024년 11월 11일 20:28"),
            entry(2, "날짜 오류", "어제"),
            entry(1, "둘째 기사", "2024년 11월 11일 08:00"),
        ]
        .concat();
        let page2 = [
            entry(0, "셋째 기사", "2024년 11월 10일 22:00"),
            entry(9, "오래된 기사", "2024년 11월 9일 10:00"),
            entry(8, "더 오래된 기사", "2024년 11월 9일 09:00"),
        ]
        .concat();
        let web = FakeWeb::new()
            .with_page(&list_url(1), &page1)
            .with_page(&list_url(2), &page2)
            .with_page("https://boannews.com/media/view.asp?idx=3", &article_page("a"))
            .with_page("https://boannews.com/media/view.asp?idx=1", &article_page("b"))
            .with_page("https://boannews.com/media/view.asp?idx=0", &article_page("c"));
        let mut merger = ArticleMerger::new();

        let pages = collect(&web, &window(), MAX_PAGES, &mut merger).await;

        assert_eq!(pages, 2);
        assert_eq!(web.requests(&list_url(3)), 0);
        let batch = merger.into_batch();
        let titles: Vec<_> = batch.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["최신 기사", "둘째 기사", "셋째 기사"]);
        assert!(batch.iter().all(|r| r.tags == vec!["보안"]));
        assert_eq!(batch[0].content, "a");
    }

    #[tokio::test]
    async fn test_collect_skips_failed_page() {
        let web = FakeWeb::new()
            .with_page(&list_url(2), &entry(5, "기사", "2024년 11월 11일 12:00"))
            .with_page("https://boannews.com/media/view.asp?idx=5", &article_page("d"));
        let mut merger = ArticleMerger::new();

        let pages = collect(&web, &window(), 2, &mut merger).await;

        assert_eq!(pages, 1);
        assert_eq!(merger.len(), 1);
    }
}
