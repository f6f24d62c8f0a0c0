//! One crawl run per source, each ending in a single ingestion batch.
//!
//! Every run follows the same shape: discover URLs, merge each one into a
//! run-scoped [`ArticleMerger`], then flush the merged batch once. Keyword runs
//! additionally resolve a search window per keyword and advance its cursor
//! after the keyword completes.
//!
//! | Run | Discovery | Keyword | Tags | Cursors |
//! |-----|-----------|---------|------|---------|
//! | Keyword news | Daum search, accuracy | backend keyword | `[keyword]` | advanced |
//! | Finance-AI | Daum search, recency | fixed list | `["금융AI"]` | none |
//! | Main news | section headlines | none | `[section]` | none |
//! | AI Times | listing | none | `["AI"]` | none |
//! | Boan News | paged listing | none | `["보안"]` | none |
//!
//! Failures are contained at the narrowest scope that makes sense: an article
//! drops itself, a keyword or section is skipped, and only a failed keyword
//! listing aborts a run.

use crate::backend::{CursorSink, IngestionSink, KeywordSource, NoCursorUpdates};
use crate::cli::{Settings, Source};
use crate::collector::{SearchEngine, SearchQuery, SortMode, collect_urls};
use crate::fetch::PageFetcher;
use crate::merge::{ArticleMerger, ContentFilter, MergeTally, Origin};
use crate::models::{CursorUpdate, KeywordCursor};
use crate::sources::daum_main::{self, CATEGORIES};
use crate::sources::{ArticleSource, aitimes, boannews};
use crate::window::SearchWindow;
use chrono::{DateTime, Duration, FixedOffset};
use itertools::Itertools;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Institutions searched by the finance-AI run, each suffixed with "AI".
pub const FINANCE_AI_KEYWORDS: &[&str] = &[
    "신한카드AI",
    "롯데카드AI",
    "비씨카드AI",
    "현대카드AI",
    "우리카드AI",
    "국민카드AI",
    "농협카드AI",
    "하나카드AI",
    "토스AI",
    "기업은행AI",
    "국민은행AI",
    "하나은행AI",
    "우리은행AI",
    "신한은행AI",
    "iM뱅크AI",
    "제일은행AI",
    "씨티은행AI",
    "케이뱅크AI",
    "카카오뱅크AI",
    "농협AI",
    "수협AI",
];

pub const FINANCE_AI_TAG: &str = "금융AI";
const FINANCE_AI_PER_KEYWORD: usize = 5;

/// Whether a run got as far as sending (or deciding not to send) its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Discovery ran; individual keywords, sections or pages may still have
    /// failed.
    Completed,
    /// The run could not start discovery and sent nothing.
    Aborted,
}

/// Outcome of one run.
///
/// For keyword runs the counters are keywords; for main news they are
/// sections and for listing runs listing pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub source: Source,
    pub status: RunStatus,
    pub keywords_processed: usize,
    pub keywords_failed: usize,
    pub articles_collected: usize,
    /// Whether the ingestion sink accepted the batch.
    pub delivered: bool,
}

impl RunReport {
    fn aborted(source: Source, failed: usize) -> Self {
        Self {
            source,
            status: RunStatus::Aborted,
            keywords_processed: 0,
            keywords_failed: failed,
            articles_collected: 0,
            delivered: false,
        }
    }
}

/// How a list of keywords is searched and merged.
#[derive(Debug, Clone, Copy)]
pub struct KeywordPlan {
    pub per_keyword: usize,
    pub sort: SortMode,
    pub lookback: Duration,
    pub max_pages: u32,
    /// Fixed tag for every record; `None` tags each record with its keyword.
    pub tag: Option<&'static str>,
}

impl KeywordPlan {
    fn origin(&self, keyword: &str) -> Origin {
        match self.tag {
            Some(tag) => Origin::keyword_tagged(keyword, tag),
            None => Origin::keyword(keyword),
        }
    }
}

/// Per-keyword tally of [`crawl_keywords`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeywordTally {
    pub processed: usize,
    pub failed: usize,
}

/// Search, merge and advance the cursor for each keyword in turn.
///
/// A keyword whose search failed keeps whatever it merged but its cursor is
/// left untouched so the next run searches the same window again.
///
/// # Arguments
///
/// * `engine` - Search results, one page at a time
/// * `articles` - Fetches and extracts each new URL
/// * `cursors` - Receives one update per completed keyword
/// * `keywords` - Keywords in crawl order with their previous cursors
/// * `plan` - Per-keyword target, sort order, lookback and tagging
/// * `start_time` - Run start; the window end and the new cursor value
/// * `merger` - Run-scoped merger shared by every keyword
///
/// # Returns
///
/// How many keywords completed and how many stopped on a failed search.
pub async fn crawl_keywords<S, A, C>(
    engine: &S,
    articles: &A,
    cursors: &C,
    keywords: &[KeywordCursor],
    plan: &KeywordPlan,
    start_time: DateTime<FixedOffset>,
    merger: &mut ArticleMerger,
) -> KeywordTally
where
    S: SearchEngine,
    A: ArticleSource,
    C: CursorSink,
{
    let mut tally = KeywordTally::default();
    for cursor in keywords {
        let keyword = cursor.keyword.as_str();
        let window = SearchWindow::resolve(cursor.last_crawled_at, start_time, plan.lookback);
        info!(keyword, start = %window.start, end = %window.end, "Crawling keyword");

        let query = SearchQuery {
            term: cursor.keyword.clone(),
            window,
            sort: plan.sort,
        };
        let collected = collect_urls(engine, &query, plan.per_keyword, plan.max_pages).await;

        let origin = plan.origin(keyword);
        let mut merged = MergeTally::default();
        for url in &collected.urls {
            merged.record(merger.merge(url, &origin, || articles.fetch_article(url)).await);
        }
        info!(
            keyword,
            urls = collected.urls.len(),
            new_articles = merged.inserted,
            keyword_added = merged.keyword_added,
            dropped = merged.dropped,
            run_total = merger.len(),
            stop = ?collected.stop,
            "Keyword crawled"
        );

        if let Some(e) = collected.failure() {
            warn!(keyword, error = %e, "Keyword search did not complete; cursor left unchanged");
            tally.failed += 1;
            continue;
        }
        tally.processed += 1;

        let update = CursorUpdate::advance(cursor, start_time);
        if let Err(e) = cursors.update_cursors(std::slice::from_ref(&update)).await {
            error!(keyword, error = %e, "Failed to update last crawled time");
        }
    }
    tally
}

/// Send the merged batch, if any.
///
/// # Returns
///
/// The batch size and whether the sink accepted it. An empty merger sends
/// nothing and reports `(0, false)`; a rejected batch is logged, not retried.
pub async fn flush_batch<I: IngestionSink>(sink: &I, merger: ArticleMerger) -> (usize, bool) {
    if merger.is_empty() {
        info!("No articles collected; nothing to send");
        return (0, false);
    }
    let batch = merger.into_batch();
    match sink.send_articles(&batch).await {
        Ok(()) => (batch.len(), true),
        Err(e) => {
            error!(count = batch.len(), error = %e, "Failed to send articles to backend");
            (batch.len(), false)
        }
    }
}

fn finish(
    source: Source,
    (processed, failed): (usize, usize),
    (collected, delivered): (usize, bool),
    t0: Instant,
) -> RunReport {
    let report = RunReport {
        source,
        status: RunStatus::Completed,
        keywords_processed: processed,
        keywords_failed: failed,
        articles_collected: collected,
        delivered,
    };
    info!(
        source = %report.source,
        processed = report.keywords_processed,
        failed = report.keywords_failed,
        articles = report.articles_collected,
        delivered = report.delivered,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Run complete"
    );
    report
}

/// Daum keyword news for the backend's keyword list.
///
/// # Arguments
///
/// * `backend` - Keyword listing, cursor sink and ingestion sink
/// * `engine` - Daum search
/// * `articles` - Daum article pages
/// * `settings` - Per-keyword target, page bound and lookback
/// * `start_time` - Run start in Seoul time
///
/// # Returns
///
/// A [`RunReport`] counting keywords. The run is [`RunStatus::Aborted`] only
/// when the keyword listing cannot be fetched.
#[instrument(level = "info", skip_all, fields(source = %Source::KeywordNews))]
pub async fn run_keyword_news<B, S, A>(
    backend: &B,
    engine: &S,
    articles: &A,
    settings: &Settings,
    start_time: DateTime<FixedOffset>,
) -> RunReport
where
    B: KeywordSource + CursorSink + IngestionSink,
    S: SearchEngine,
    A: ArticleSource,
{
    let t0 = Instant::now();
    info!(start = %start_time, "Keyword news run starting");

    let keywords = match backend.fetch_keywords().await {
        Ok(keywords) => keywords,
        Err(e) => {
            error!(error = %e, "Could not fetch keywords; aborting run");
            return RunReport::aborted(Source::KeywordNews, 0);
        }
    };
    info!(
        count = keywords.len(),
        keywords = %keywords.iter().map(|k| k.keyword.as_str()).join(", "),
        "Keywords to crawl"
    );

    let plan = KeywordPlan {
        per_keyword: settings.articles_per_keyword,
        sort: SortMode::Accuracy,
        lookback: settings.lookback,
        max_pages: settings.max_pages,
        tag: None,
    };
    let mut merger = ArticleMerger::new();
    let tally =
        crawl_keywords(engine, articles, backend, &keywords, &plan, start_time, &mut merger).await;
    let flushed = flush_batch(backend, merger).await;
    finish(Source::KeywordNews, (tally.processed, tally.failed), flushed, t0)
}

/// Daum search for financial institutions' AI news, filtered to AI content.
#[instrument(level = "info", skip_all, fields(source = %Source::FinanceAi))]
pub async fn run_finance_ai<I, S, A>(
    sink: &I,
    engine: &S,
    articles: &A,
    settings: &Settings,
    start_time: DateTime<FixedOffset>,
) -> RunReport
where
    I: IngestionSink,
    S: SearchEngine,
    A: ArticleSource,
{
    let t0 = Instant::now();
    info!(
        start = %start_time,
        count = FINANCE_AI_KEYWORDS.len(),
        "Finance-AI run starting"
    );

    let keywords: Vec<KeywordCursor> = FINANCE_AI_KEYWORDS
        .iter()
        .map(|k| KeywordCursor::fresh(*k))
        .collect();
    let plan = KeywordPlan {
        per_keyword: FINANCE_AI_PER_KEYWORD,
        sort: SortMode::Recency,
        lookback: settings.lookback,
        max_pages: settings.max_pages,
        tag: Some(FINANCE_AI_TAG),
    };
    let mut merger = ArticleMerger::with_filter(ContentFilter::AiRelated);
    let cursors = NoCursorUpdates;
    let tally =
        crawl_keywords(engine, articles, &cursors, &keywords, &plan, start_time, &mut merger).await;
    let flushed = flush_batch(sink, merger).await;
    finish(Source::FinanceAi, (tally.processed, tally.failed), flushed, t0)
}

/// Headlines from the Daum section front pages.
#[instrument(level = "info", skip_all, fields(source = %Source::MainNews))]
pub async fn run_main_news<I, F, A>(sink: &I, fetcher: &F, articles: &A) -> RunReport
where
    I: IngestionSink,
    F: PageFetcher,
    A: ArticleSource,
{
    let t0 = Instant::now();
    let mut merger = ArticleMerger::new();
    let tally = daum_main::collect(fetcher, articles, CATEGORIES, &mut merger).await;
    let flushed = flush_batch(sink, merger).await;
    finish(Source::MainNews, (tally.processed, tally.failed), flushed, t0)
}

/// Latest AI Times articles inside the lookback window.
#[instrument(level = "info", skip_all, fields(source = %Source::AiTimes))]
pub async fn run_aitimes<I, F>(
    sink: &I,
    fetcher: &F,
    settings: &Settings,
    start_time: DateTime<FixedOffset>,
) -> RunReport
where
    I: IngestionSink,
    F: PageFetcher,
{
    let t0 = Instant::now();
    let window = SearchWindow::lookback_from(start_time, settings.lookback);
    let mut merger = ArticleMerger::new();
    if let Err(e) = aitimes::collect(fetcher, &window, &mut merger).await {
        error!(error = %e, "AI Times listing unavailable; aborting run");
        return RunReport::aborted(Source::AiTimes, 1);
    }
    let flushed = flush_batch(sink, merger).await;
    finish(Source::AiTimes, (1, 0), flushed, t0)
}

/// Latest Boan News articles inside the lookback window.
#[instrument(level = "info", skip_all, fields(source = %Source::BoanNews))]
pub async fn run_boan_news<I, F>(
    sink: &I,
    fetcher: &F,
    settings: &Settings,
    start_time: DateTime<FixedOffset>,
) -> RunReport
where
    I: IngestionSink,
    F: PageFetcher,
{
    let t0 = Instant::now();
    let window = SearchWindow::lookback_from(start_time, settings.lookback);
    let mut merger = ArticleMerger::new();
    let pages = boannews::collect(fetcher, &window, boannews::MAX_PAGES, &mut merger).await;
    let flushed = flush_batch(sink, merger).await;
    finish(Source::BoanNews, (pages, 0), flushed, t0)
}
