//! Daum news search and article pages.
//!
//! Search results come from `search.daum.net` filtered to a start/end window;
//! every result links to a `v.daum.net` article page with a stable layout.
//!
//! # Article layout
//!
//! | Field | Selector |
//! |-------|----------|
//! | Title | `h3.tit_view` |
//! | Date | `span.num_date` (`2024. 11. 11. 20:28`) |
//! | Body | `div.article_view` blocks with `dmcf-ptype="general"` |
//! | Captions | `figcaption.txt_caption` |
//! | Lead image | `img.thumb_g_article` |

use super::{ArticleSource, ParsedArticle, css, element_text, first_text};
use crate::collector::{SearchEngine, SearchQuery};
use crate::error::{CrawlError, ExtractError};
use crate::fetch::PageFetcher;
use crate::models::ExtractedArticle;
use crate::utils::parse_seoul_datetime;
use scraper::Html;
use tracing::{debug, info, instrument};

const SEARCH_BASE: &str = "https://search.daum.net/search";
const SEARCH_FIXED_PARAMS: &str = "nil_suggest=btn&w=news&DA=PGD&cluster=y";
const DATE_FORMAT: &str = "%Y. %m. %d. %H:%M";
const CAPTION_PREFIX: &str = "[사진]";

/// Build the search URL for one page of `query`.
pub fn build_search_url(query: &SearchQuery, page: u32) -> String {
    format!(
        "{SEARCH_BASE}?{SEARCH_FIXED_PARAMS}&q={}&sort={}&sd={}&ed={}&period=u&p={page}",
        urlencoding::encode(&query.term),
        query.sort.as_param(),
        query.window.start_param(),
        query.window.end_param(),
    )
}

/// Article links on a search result page, in page order.
pub fn parse_search_results(html: &str) -> Result<Vec<String>, ExtractError> {
    let document = Html::parse_document(html);
    let item = css("div.item-title")?;
    let link = css("a")?;

    Ok(document
        .select(&item)
        .filter_map(|title| title.select(&link).next())
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect())
}

/// Extract an article from a Daum content page.
///
/// Body blocks and captions are trimmed but otherwise kept as written, line
/// breaks included. Blocks are joined with a blank line and captions follow
/// the body.
///
/// # Errors
///
/// Returns [`ExtractError::MissingField`] without a title or article body and
/// [`ExtractError::EmptyBody`] when no body block or caption has text.
pub fn parse_article(html: &str) -> Result<ParsedArticle, ExtractError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let title =
        first_text(root, &css("h3.tit_view")?).ok_or(ExtractError::MissingField("title"))?;
    let body = root
        .select(&css("div.article_view")?)
        .next()
        .ok_or(ExtractError::MissingField("article_view"))?;

    let mut blocks: Vec<String> = body
        .select(&css(r#"p[dmcf-ptype="general"], div[dmcf-ptype="general"]"#)?)
        .map(element_text)
        .filter(|text| !text.is_empty() && !text.starts_with("Copyright"))
        .collect();
    blocks.extend(
        body.select(&css("figcaption.txt_caption")?)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .map(|caption| format!("{CAPTION_PREFIX} {caption}")),
    );
    if blocks.is_empty() {
        return Err(ExtractError::EmptyBody);
    }

    let published_at = first_text(root, &css("span.num_date")?)
        .and_then(|raw| parse_seoul_datetime(&raw, DATE_FORMAT));

    let image_url = body
        .select(&css("img.thumb_g_article")?)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    Ok(ParsedArticle {
        title,
        content: blocks.join("\n\n"),
        published_at,
        image_url,
    })
}

/// Daum news search driven through a [`PageFetcher`].
#[derive(Debug)]
pub struct DaumSearch<'a, F> {
    fetcher: &'a F,
}

impl<'a, F: PageFetcher> DaumSearch<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self { fetcher }
    }
}

impl<F: PageFetcher> SearchEngine for DaumSearch<'_, F> {
    #[instrument(level = "info", skip_all, fields(term = %query.term, page = page))]
    async fn search_page(&self, query: &SearchQuery, page: u32) -> Result<Vec<String>, CrawlError> {
        let url = build_search_url(query, page);
        info!(%url, "Crawling search page");
        let html = self.fetcher.fetch_text(&url).await?;
        let links = parse_search_results(&html)?;
        debug!(count = links.len(), "Search results on page");
        Ok(links)
    }
}

/// Daum article pages driven through a [`PageFetcher`].
#[derive(Debug)]
pub struct DaumArticles<'a, F> {
    fetcher: &'a F,
}

impl<'a, F: PageFetcher> DaumArticles<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self { fetcher }
    }
}

impl<F: PageFetcher> ArticleSource for DaumArticles<'_, F> {
    #[instrument(level = "info", skip(self))]
    async fn fetch_article(&self, url: &str) -> Result<ExtractedArticle, CrawlError> {
        info!("Fetching content");
        let html = self.fetcher.fetch_text(url).await?;
        let parsed = parse_article(&html)?;
        Ok(parsed.finish(self.fetcher, url).await)
    }
}
