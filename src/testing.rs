//! In-memory fakes for the search interface, article pages, the web and the
//! backend. Every fake counts its calls and can be scripted to fail.

use crate::backend::{CursorSink, IngestionSink, KeywordSource};
use crate::collector::{SearchEngine, SearchQuery, SortMode};
use crate::error::{CrawlError, ExtractError};
use crate::fetch::PageFetcher;
use crate::models::{ArticleRecord, CursorUpdate, ExtractedArticle, KeywordCursor};
use crate::sources::ArticleSource;
use crate::utils::seoul;
use crate::window::{LOOKBACK_HOURS, SearchWindow};
use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

/// Fixed "now" used across tests: 2024-11-11 15:00 in Seoul.
pub fn test_now() -> DateTime<FixedOffset> {
    seoul().with_ymd_and_hms(2024, 11, 11, 15, 0, 0).unwrap()
}

pub fn query(term: &str) -> SearchQuery {
    SearchQuery {
        term: term.to_string(),
        window: SearchWindow::lookback_from(test_now(), Duration::hours(LOOKBACK_HOURS)),
        sort: SortMode::Accuracy,
    }
}

pub fn article(url: &str, title: &str) -> ExtractedArticle {
    ExtractedArticle {
        title: title.to_string(),
        content: format!("{title} 본문"),
        published_at: Some(seoul().with_ymd_and_hms(2024, 11, 11, 9, 30, 0).unwrap()),
        url: url.to_string(),
        thumbnail_image: None,
    }
}

#[derive(Debug, Clone)]
enum Script {
    Pages(Vec<Vec<String>>),
    Endless(usize),
}

impl Script {
    fn page(&self, term: &str, page: u32) -> Vec<String> {
        match self {
            Script::Pages(pages) => pages.get(page as usize - 1).cloned().unwrap_or_default(),
            Script::Endless(per_page) => (0..*per_page)
                .map(|i| format!("https://v.daum.net/v/{term}-{page}-{i}"))
                .collect(),
        }
    }
}

/// Search engine answering from scripted result pages.
#[derive(Debug)]
pub struct ScriptedSearch {
    default: Script,
    by_term: HashMap<String, Script>,
    failing_terms: HashSet<String>,
    fail_from: Option<u32>,
    requested: Cell<u32>,
    queries: RefCell<Vec<SearchQuery>>,
}

impl ScriptedSearch {
    fn with_script(default: Script) -> Self {
        Self {
            default,
            by_term: HashMap::new(),
            failing_terms: HashSet::new(),
            fail_from: None,
            requested: Cell::new(0),
            queries: RefCell::new(Vec::new()),
        }
    }

    /// The same pages for every term; pages past the end are empty.
    pub fn pages(pages: Vec<Vec<String>>) -> Self {
        Self::with_script(Script::Pages(pages))
    }

    /// `per_page` fresh URLs on every page, unique per term and page.
    pub fn endless(per_page: usize) -> Self {
        Self::with_script(Script::Endless(per_page))
    }

    /// Override the pages returned for one term.
    pub fn term(mut self, term: &str, pages: Vec<Vec<&str>>) -> Self {
        let pages = pages
            .into_iter()
            .map(|page| page.into_iter().map(str::to_string).collect())
            .collect();
        self.by_term.insert(term.to_string(), Script::Pages(pages));
        self
    }

    /// Every page request for `term` fails.
    pub fn failing_term(mut self, term: &str) -> Self {
        self.failing_terms.insert(term.to_string());
        self
    }

    /// Every page numbered `page` or later fails.
    pub fn failing_from_page(mut self, page: u32) -> Self {
        self.fail_from = Some(page);
        self
    }

    pub fn pages_requested(&self) -> u32 {
        self.requested.get()
    }

    /// Distinct queries seen, in first-request order.
    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.borrow().clone()
    }
}

impl SearchEngine for ScriptedSearch {
    async fn search_page(&self, query: &SearchQuery, page: u32) -> Result<Vec<String>, CrawlError> {
        self.requested.set(self.requested.get() + 1);
        if page == 1 {
            self.queries.borrow_mut().push(query.clone());
        }
        let failing_page = self.fail_from.is_some_and(|from| page >= from);
        if failing_page || self.failing_terms.contains(&query.term) {
            return Err(CrawlError::Fake(format!("search {} page {page}", query.term)));
        }
        let script = self.by_term.get(&query.term).unwrap_or(&self.default);
        Ok(script.page(&query.term, page))
    }
}

/// Article source serving canned extractions and counting fetches per URL.
#[derive(Debug, Default)]
pub struct FakeArticles {
    articles: HashMap<String, ExtractedArticle>,
    failures: HashMap<String, ExtractError>,
    calls: RefCell<HashMap<String, usize>>,
}

impl FakeArticles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, article: ExtractedArticle) -> Self {
        self.articles.insert(article.url.clone(), article);
        self
    }

    pub fn failing(mut self, url: &str, error: ExtractError) -> Self {
        self.failures.insert(url.to_string(), error);
        self
    }

    pub async fn fetch(&self, url: &str) -> Result<ExtractedArticle, CrawlError> {
        *self.calls.borrow_mut().entry(url.to_string()).or_default() += 1;
        if let Some(error) = self.failures.get(url) {
            return Err(error.clone().into());
        }
        self.articles
            .get(url)
            .cloned()
            .ok_or_else(|| CrawlError::Fake(format!("no article at {url}")))
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.borrow().get(url).copied().unwrap_or(0)
    }
}

impl ArticleSource for FakeArticles {
    async fn fetch_article(&self, url: &str) -> Result<ExtractedArticle, CrawlError> {
        self.fetch(url).await
    }
}

/// A web of canned pages and images. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct FakeWeb {
    bodies: HashMap<String, Vec<u8>>,
    requests: RefCell<HashMap<String, usize>>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.bodies.insert(url.to_string(), html.as_bytes().to_vec());
        self
    }

    pub fn with_bytes(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), bytes);
        self
    }

    pub fn requests(&self, url: &str) -> usize {
        self.requests.borrow().get(url).copied().unwrap_or(0)
    }

    fn serve(&self, url: &str) -> Result<Vec<u8>, CrawlError> {
        *self.requests.borrow_mut().entry(url.to_string()).or_default() += 1;
        self.bodies.get(url).cloned().ok_or_else(|| CrawlError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

impl PageFetcher for FakeWeb {
    async fn fetch_text(&self, url: &str) -> Result<String, CrawlError> {
        let bytes = self.serve(url)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CrawlError> {
        self.serve(url)
    }
}

/// Backend recording every cursor update and ingestion batch it receives.
#[derive(Debug, Default)]
pub struct FakeBackend {
    keywords: Vec<KeywordCursor>,
    keywords_fail: bool,
    cursors_fail: bool,
    ingest_fail: bool,
    keyword_calls: Cell<usize>,
    cursor_updates: RefCell<Vec<CursorUpdate>>,
    batches: RefCell<Vec<Vec<ArticleRecord>>>,
}

impl FakeBackend {
    pub fn new(keywords: Vec<KeywordCursor>) -> Self {
        Self {
            keywords,
            ..Self::default()
        }
    }

    pub fn with_keywords(keywords: &[&str]) -> Self {
        Self::new(keywords.iter().map(|k| KeywordCursor::fresh(*k)).collect())
    }

    pub fn failing_keywords(mut self) -> Self {
        self.keywords_fail = true;
        self
    }

    pub fn failing_cursors(mut self) -> Self {
        self.cursors_fail = true;
        self
    }

    pub fn failing_ingest(mut self) -> Self {
        self.ingest_fail = true;
        self
    }

    pub fn keyword_calls(&self) -> usize {
        self.keyword_calls.get()
    }

    pub fn cursor_updates(&self) -> Vec<CursorUpdate> {
        self.cursor_updates.borrow().clone()
    }

    /// Every batch offered to the ingestion sink, including rejected ones.
    pub fn batches(&self) -> Vec<Vec<ArticleRecord>> {
        self.batches.borrow().clone()
    }
}

impl KeywordSource for FakeBackend {
    async fn fetch_keywords(&self) -> Result<Vec<KeywordCursor>, CrawlError> {
        self.keyword_calls.set(self.keyword_calls.get() + 1);
        if self.keywords_fail {
            return Err(CrawlError::Fake("keyword listing unavailable".to_string()));
        }
        Ok(self.keywords.clone())
    }
}

impl CursorSink for FakeBackend {
    async fn update_cursors(&self, updates: &[CursorUpdate]) -> Result<(), CrawlError> {
        if self.cursors_fail {
            return Err(CrawlError::Fake("cursor update rejected".to_string()));
        }
        self.cursor_updates.borrow_mut().extend_from_slice(updates);
        Ok(())
    }
}

impl IngestionSink for FakeBackend {
    async fn send_articles(&self, articles: &[ArticleRecord]) -> Result<(), CrawlError> {
        self.batches.borrow_mut().push(articles.to_vec());
        if self.ingest_fail {
            return Err(CrawlError::Fake("ingestion rejected".to_string()));
        }
        Ok(())
    }
}
