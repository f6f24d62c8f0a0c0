//! Run-scoped deduplication of crawled articles.
//!
//! The [`ArticleMerger`] owns the URL → record map for one run. A URL's
//! content is fetched only the first time it is seen; every later discovery
//! just adds the discovering keyword to the existing record.
//!
//! # Content filters
//!
//! A [`ContentFilter`] can veto a new record before it is stored. A vetoed
//! URL is not remembered, so a later discovery under another keyword fetches
//! and filters it again.

use crate::error::CrawlError;
use crate::models::{ArticleRecord, ExtractedArticle};
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info, warn};

/// Opt-out notices that publishers append to articles. They mention "AI"
/// without the article being about AI, so they are removed before matching.
const AI_OPT_OUT_PHRASES: &[&str] = &["AI학습 이용 금지", "AI 데이터 활용 금지"];

/// Marker terms that make a finance article count as AI related.
const AI_MARKERS: &[&str] = &["AI"];

/// Whether an article body talks about AI once boilerplate notices are removed.
pub fn is_ai_related_content(content: &str) -> bool {
    let cleaned = AI_OPT_OUT_PHRASES
        .iter()
        .fold(content.to_string(), |acc, phrase| acc.replace(phrase, ""));
    AI_MARKERS.iter().any(|marker| cleaned.contains(marker))
}

/// Gate applied to a freshly extracted article before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentFilter {
    #[default]
    AcceptAll,
    AiRelated,
}

impl ContentFilter {
    pub fn accepts(&self, article: &ExtractedArticle) -> bool {
        match self {
            ContentFilter::AcceptAll => true,
            ContentFilter::AiRelated => is_ai_related_content(&article.content),
        }
    }
}

/// The keyword or category context that surfaced a URL.
#[derive(Debug, Clone)]
pub struct Origin {
    /// Keyword to record on the article. Category and listing crawls have none.
    pub keyword: Option<String>,
    /// Tags assigned when the record is created.
    pub tags: Vec<String>,
}

impl Origin {
    /// A keyword search whose tag is the keyword itself.
    pub fn keyword(keyword: &str) -> Self {
        Self {
            keyword: Some(keyword.to_string()),
            tags: vec![keyword.to_string()],
        }
    }

    /// A keyword search that tags with a fixed label.
    pub fn keyword_tagged(keyword: &str, tag: &str) -> Self {
        Self {
            keyword: Some(keyword.to_string()),
            tags: vec![tag.to_string()],
        }
    }

    /// A category page or listing with no keyword.
    pub fn category(tag: &str) -> Self {
        Self {
            keyword: None,
            tags: vec![tag.to_string()],
        }
    }
}

/// What a single [`ArticleMerger::merge`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    KeywordAdded,
    AlreadyKnown,
    /// The fetch or extraction failed; the error was logged where it happened.
    FetchFailed,
    Filtered,
}

/// Running count of merge outcomes for one keyword, section or listing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeTally {
    pub inserted: usize,
    pub keyword_added: usize,
    pub already_known: usize,
    /// Fetch failures and filter rejections.
    pub dropped: usize,
}

impl MergeTally {
    pub fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::KeywordAdded => self.keyword_added += 1,
            MergeOutcome::AlreadyKnown => self.already_known += 1,
            MergeOutcome::FetchFailed | MergeOutcome::Filtered => self.dropped += 1,
        }
    }
}

/// URL → record map for one crawl run, preserving first-discovery order.
#[derive(Debug, Default)]
pub struct ArticleMerger {
    articles: HashMap<String, ArticleRecord>,
    order: Vec<String>,
    filter: ContentFilter,
}

impl ArticleMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: ContentFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Merge one discovery of `url`.
    ///
    /// `fetch` is only invoked when `url` has no record yet. Fetch or
    /// extraction failures and filter rejections drop the candidate; they are
    /// logged here and never propagated.
    ///
    /// # Arguments
    ///
    /// * `url` - Deduplication key
    /// * `origin` - Keyword to record and tags for a new record
    /// * `fetch` - Produces the article the first time `url` is seen
    ///
    /// # Returns
    ///
    /// What happened to the candidate, for the caller's [`MergeTally`].
    pub async fn merge<F, Fut>(&mut self, url: &str, origin: &Origin, fetch: F) -> MergeOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ExtractedArticle, CrawlError>>,
    {
        if let Some(existing) = self.articles.get_mut(url) {
            return match origin.keyword.as_deref() {
                Some(keyword) if existing.add_keyword(keyword) => {
                    info!(%url, keyword, "Added keyword to already collected article");
                    MergeOutcome::KeywordAdded
                }
                _ => {
                    debug!(%url, "Article already collected");
                    MergeOutcome::AlreadyKnown
                }
            };
        }

        let extracted = match fetch().await {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!(%url, error = %e, "Dropping article");
                return MergeOutcome::FetchFailed;
            }
        };

        if !self.filter.accepts(&extracted) {
            info!(%url, filter = ?self.filter, "Article rejected by content filter");
            return MergeOutcome::Filtered;
        }

        info!(%url, title = %extracted.title, "Collected article");
        let keyword = origin.keyword.as_deref();
        let record = ArticleRecord::new(extracted, keyword, origin.tags.clone());
        self.order.push(url.to_string());
        self.articles.insert(url.to_string(), record);
        MergeOutcome::Inserted
    }

    /// Number of distinct articles merged so far.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no article has been merged yet.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, url: &str) -> Option<&ArticleRecord> {
        self.articles.get(url)
    }

    /// Consume the merger, yielding records in first-discovery order.
    pub fn into_batch(mut self) -> Vec<ArticleRecord> {
        self.order
            .iter()
            .filter_map(|url| self.articles.remove(url))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::testing::{article, FakeArticles};

    #[test]
    fn test_ai_filter_ignores_opt_out_notice() {
        assert!(!is_ai_related_content("신한카드 신규 상품 출시. AI학습 이용 금지"));
        assert!(!is_ai_related_content("AI 데이터 활용 금지 - 무단전재"));
        assert!(is_ai_related_content("생성형 AI 상담 서비스 도입. AI학습 이용 금지"));
        assert!(!is_ai_related_content("카드 수수료 인하"));
    }

    #[tokio::test]
    async fn test_repeated_url_is_fetched_once_and_tagged_twice() {
        let source = FakeArticles::new().with(article("u1", "금리 인하"));
        let mut merger = ArticleMerger::new();

        let first = merger.merge("u1", &Origin::keyword("은행"), || source.fetch("u1")).await;
        let second = merger.merge("u1", &Origin::keyword("카드"), || source.fetch("u1")).await;
        let third = merger.merge("u1", &Origin::keyword("은행"), || source.fetch("u1")).await;

        assert!(matches!(first, MergeOutcome::Inserted));
        assert!(matches!(second, MergeOutcome::KeywordAdded));
        assert!(matches!(third, MergeOutcome::AlreadyKnown));
        assert_eq!(source.calls("u1"), 1);

        let record = merger.get("u1").unwrap();
        assert_eq!(record.keywords, vec!["은행", "카드"]);
        assert_eq!(record.tags, vec!["은행"]);
    }

    #[tokio::test]
    async fn test_keyword_sets_match_calls_in_any_order() {
        let source = FakeArticles::new()
            .with(article("u1", "a"))
            .with(article("u2", "b"))
            .with(article("u3", "c"));
        let calls = [
            ("u2", "카드"),
            ("u1", "은행"),
            ("u2", "은행"),
            ("u3", "카드"),
            ("u1", "은행"),
            ("u2", "카드"),
            ("u3", "BC카드"),
        ];

        let mut merger = ArticleMerger::new();
        for (url, keyword) in calls {
            merger.merge(url, &Origin::keyword(keyword), || source.fetch(url)).await;
        }

        assert_eq!(merger.len(), 3);
        assert_eq!(merger.get("u1").unwrap().keywords, vec!["은행"]);
        assert_eq!(merger.get("u2").unwrap().keywords, vec!["카드", "은행"]);
        assert_eq!(merger.get("u3").unwrap().keywords, vec!["카드", "BC카드"]);
        for url in ["u1", "u2", "u3"] {
            assert_eq!(source.calls(url), 1, "{url} fetched more than once");
        }

        let batch = merger.into_batch();
        let order: Vec<_> = batch.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(order, vec!["u2", "u1", "u3"]);
    }

    #[tokio::test]
    async fn test_extraction_failure_drops_candidate() {
        let source = FakeArticles::new().failing("u1", ExtractError::MissingField("title"));
        let mut merger = ArticleMerger::new();

        let outcome = merger.merge("u1", &Origin::keyword("은행"), || source.fetch("u1")).await;

        assert_eq!(outcome, MergeOutcome::FetchFailed);
        assert!(merger.is_empty());
    }

    #[tokio::test]
    async fn test_filter_rejection_is_not_remembered() {
        let mut plain = article("u1", "카드 실적 발표");
        plain.content = "분기 실적이 개선됐다. AI학습 이용 금지".to_string();
        let source = FakeArticles::new().with(plain);
        let mut merger = ArticleMerger::with_filter(ContentFilter::AiRelated);

        let shinhan = Origin::keyword_tagged("신한카드AI", "금융AI");
        let kookmin = Origin::keyword_tagged("국민카드AI", "금융AI");
        let first = merger.merge("u1", &shinhan, || source.fetch("u1")).await;
        let second = merger.merge("u1", &kookmin, || source.fetch("u1")).await;

        assert_eq!(first, MergeOutcome::Filtered);
        assert_eq!(second, MergeOutcome::Filtered);
        assert_eq!(source.calls("u1"), 2);
        assert!(merger.is_empty());
    }

    #[tokio::test]
    async fn test_tally_counts_each_outcome() {
        let source = FakeArticles::new()
            .with(article("u1", "금리 인하"))
            .failing("u2", ExtractError::EmptyBody);
        let mut merger = ArticleMerger::new();
        let mut tally = MergeTally::default();

        for (url, keyword) in [("u1", "은행"), ("u1", "카드"), ("u1", "은행"), ("u2", "은행")] {
            tally.record(merger.merge(url, &Origin::keyword(keyword), || source.fetch(url)).await);
        }

        assert_eq!(
            tally,
            MergeTally {
                inserted: 1,
                keyword_added: 1,
                already_known: 1,
                dropped: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_category_origin_keeps_keywords_empty() {
        let source = FakeArticles::new().with(article("u1", "속보"));
        let mut merger = ArticleMerger::new();

        merger.merge("u1", &Origin::category("사회"), || source.fetch("u1")).await;
        let again = merger.merge("u1", &Origin::category("정치"), || source.fetch("u1")).await;

        assert!(matches!(again, MergeOutcome::AlreadyKnown));
        let record = merger.get("u1").unwrap();
        assert!(record.keywords.is_empty());
        assert_eq!(record.tags, vec!["사회"]);
        assert_eq!(source.calls("u1"), 1);
    }
}
