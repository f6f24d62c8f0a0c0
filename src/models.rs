//! Data models for crawled articles and per-keyword crawl cursors.
//!
//! This module defines the core data structures used throughout the crawler:
//! - [`ExtractedArticle`]: what a source extractor pulls out of one page
//! - [`ArticleRecord`]: the normalized record sent to the ingestion endpoint
//! - [`KeywordCursor`]: the backend's last-crawled marker for one keyword
//! - [`CursorUpdate`]: the value written back after a keyword completes
//!
//! Timestamps carry the fixed Seoul offset (+09:00) and serialize as RFC 3339.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Article fields extracted from a content page, before any keyword or tag
/// is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedArticle {
    pub title: String,
    /// Body text blocks joined with blank lines.
    pub content: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub url: String,
    /// Base64 encoded lead image, when one was found and downloaded.
    pub thumbnail_image: Option<String>,
}

/// A normalized article as accepted by the backend ingestion endpoint.
///
/// Within one run the `url` is the identity key: a record is created once per
/// unique URL and later discoveries only extend `keywords`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub content: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub url: String,
    /// Keywords that surfaced this article, in discovery order, no repeats.
    pub keywords: Vec<String>,
    /// Category labels assigned when the record is created.
    pub tags: Vec<String>,
    pub thumbnail_image: Option<String>,
}

impl ArticleRecord {
    /// Build a record from extracted fields and the context that found it.
    pub fn new(article: ExtractedArticle, keyword: Option<&str>, tags: Vec<String>) -> Self {
        Self {
            title: article.title,
            content: article.content,
            published_at: article.published_at,
            url: article.url,
            keywords: keyword.map(|k| vec![k.to_string()]).unwrap_or_default(),
            tags,
            thumbnail_image: article.thumbnail_image,
        }
    }

    /// Append `keyword` unless it is already present. Returns whether the
    /// keyword list changed.
    pub fn add_keyword(&mut self, keyword: &str) -> bool {
        if self.keywords.iter().any(|k| k == keyword) {
            return false;
        }
        self.keywords.push(keyword.to_string());
        true
    }
}

/// The backend's crawl marker for one keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordCursor {
    pub keyword: String,
    pub last_crawled_at: Option<DateTime<FixedOffset>>,
}

impl KeywordCursor {
    /// A cursor that has never been advanced.
    pub fn fresh(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            last_crawled_at: None,
        }
    }
}

/// Payload item for the cursor update endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CursorUpdate {
    pub keyword: String,
    pub last_crawled_dt: DateTime<FixedOffset>,
}

impl CursorUpdate {
    /// Advance `cursor` to `start_time` without ever moving it backwards.
    pub fn advance(cursor: &KeywordCursor, start_time: DateTime<FixedOffset>) -> Self {
        let last_crawled_dt = match cursor.last_crawled_at {
            Some(previous) if previous > start_time => previous,
            _ => start_time,
        };
        Self {
            keyword: cursor.keyword.clone(),
            last_crawled_dt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::seoul;
    use chrono::TimeZone;

    fn extracted(url: &str) -> ExtractedArticle {
        ExtractedArticle {
            title: "금리 동결".to_string(),
            content: "본문 첫 문단\n\n본문 둘째 문단".to_string(),
            published_at: Some(seoul().with_ymd_and_hms(2024, 11, 11, 20, 28, 0).unwrap()),
            url: url.to_string(),
            thumbnail_image: None,
        }
    }

    #[test]
    fn test_record_from_keyword_discovery() {
        let record = ArticleRecord::new(
            extracted("https://v.daum.net/v/1"),
            Some("은행"),
            vec!["은행".to_string()],
        );
        assert_eq!(record.keywords, vec!["은행"]);
        assert_eq!(record.tags, vec!["은행"]);
        assert_eq!(record.url, "https://v.daum.net/v/1");
    }

    #[test]
    fn test_record_from_category_has_no_keywords() {
        let record =
            ArticleRecord::new(extracted("https://v.daum.net/v/2"), None, vec!["IT".to_string()]);
        assert!(record.keywords.is_empty());
        assert_eq!(record.tags, vec!["IT"]);
    }

    #[test]
    fn test_add_keyword_ignores_repeats() {
        let mut record =
            ArticleRecord::new(extracted("https://v.daum.net/v/3"), Some("은행"), vec![]);
        assert!(record.add_keyword("카드"));
        assert!(!record.add_keyword("은행"));
        assert!(!record.add_keyword("카드"));
        assert_eq!(record.keywords, vec!["은행", "카드"]);
    }

    #[test]
    fn test_record_serialization_shape() {
        let record = ArticleRecord::new(
            extracted("https://v.daum.net/v/4"),
            Some("은행"),
            vec!["은행".to_string()],
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["published_at"], "2024-11-11T20:28:00+09:00");
        assert_eq!(json["thumbnail_image"], serde_json::Value::Null);
        assert_eq!(json["keywords"][0], "은행");
        assert_eq!(json["url"], "https://v.daum.net/v/4");
    }

    #[test]
    fn test_cursor_update_never_moves_backwards() {
        let start = seoul().with_ymd_and_hms(2024, 11, 11, 12, 0, 0).unwrap();
        let later = seoul().with_ymd_and_hms(2024, 11, 11, 13, 0, 0).unwrap();

        let stale = KeywordCursor {
            keyword: "은행".to_string(),
            last_crawled_at: Some(start - chrono::Duration::hours(3)),
        };
        assert_eq!(CursorUpdate::advance(&stale, start).last_crawled_dt, start);

        let ahead = KeywordCursor {
            keyword: "은행".to_string(),
            last_crawled_at: Some(later),
        };
        assert_eq!(CursorUpdate::advance(&ahead, start).last_crawled_dt, later);

        let fresh = KeywordCursor::fresh("카드");
        assert_eq!(CursorUpdate::advance(&fresh, start).last_crawled_dt, start);
    }

    #[test]
    fn test_cursor_update_serialization() {
        let update = CursorUpdate {
            keyword: "카드".to_string(),
            last_crawled_dt: seoul().with_ymd_and_hms(2024, 11, 11, 9, 0, 0).unwrap(),
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"keyword":"카드","last_crawled_dt":"2024-11-11T09:00:00+09:00"}"#);
    }
}
