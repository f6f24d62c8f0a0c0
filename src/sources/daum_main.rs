//! Daum main news: headline lists from the six section front pages.
//!
//! Each headline is fetched as a regular Daum article and tagged with its
//! section name. A section that fails to load is skipped.

use super::{ArticleSource, css, resolve_link};
use crate::error::{CrawlError, ExtractError};
use crate::fetch::PageFetcher;
use crate::merge::{ArticleMerger, MergeTally, Origin};
use scraper::Html;
use tracing::{error, info, instrument};

/// A section front page and the tag its articles receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub tag: &'static str,
    pub url: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category { tag: "사회", url: "https://news.daum.net/society" },
    Category { tag: "정치", url: "https://news.daum.net/politics" },
    Category { tag: "경제", url: "https://news.daum.net/economic" },
    Category { tag: "국제", url: "https://news.daum.net/foreign" },
    Category { tag: "문화", url: "https://news.daum.net/culture" },
    Category { tag: "IT", url: "https://news.daum.net/digital" },
];

/// Headline article links on a section front page.
pub fn parse_headlines(html: &str, base: &str) -> Result<Vec<String>, ExtractError> {
    let document = Html::parse_document(html);
    let link = css("ul.list_newsheadline2 li a.item_newsheadline2[href]")?;
    Ok(document
        .select(&link)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(base, href))
        .collect())
}

/// Tally of one main news crawl.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SectionTally {
    pub processed: usize,
    pub failed: usize,
    /// Merge outcomes across every section.
    pub merged: MergeTally,
}

/// Crawl every category's headlines into `merger`.
#[instrument(level = "info", skip_all, fields(categories = categories.len()))]
pub async fn collect<F, A>(
    fetcher: &F,
    articles: &A,
    categories: &[Category],
    merger: &mut ArticleMerger,
) -> SectionTally
where
    F: PageFetcher,
    A: ArticleSource,
{
    let mut tally = SectionTally::default();
    for category in categories {
        info!(category = category.tag, "Crawling category");
        let links = match fetcher.fetch_text(category.url).await {
            Ok(html) => parse_headlines(&html, category.url).map_err(CrawlError::from),
            Err(e) => Err(e),
        };
        let links = match links {
            Ok(links) => links,
            Err(e) => {
                error!(category = category.tag, error = %e, "Category page failed; skipping");
                tally.failed += 1;
                continue;
            }
        };

        let origin = Origin::category(category.tag);
        let mut merged = MergeTally::default();
        for url in &links {
            let outcome = merger.merge(url, &origin, || articles.fetch_article(url)).await;
            merged.record(outcome);
            tally.merged.record(outcome);
        }
        info!(
            category = category.tag,
            headlines = links.len(),
            added = merged.inserted,
            seen_in_earlier_section = merged.already_known,
            dropped = merged.dropped,
            "Category crawled"
        );
        tally.processed += 1;
    }
    tally
}
