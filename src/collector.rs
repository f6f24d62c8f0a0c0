//! Paginated URL collection from a search interface.
//!
//! Search backends return results in a stable order without a reliable total
//! count, so collection stops on the first of:
//! - the target count is reached
//! - a URL already collected in this pass shows up again
//! - a page comes back empty
//! - the page bound is hit
//! - a page fails to load (partial results are kept)

use crate::error::CrawlError;
use crate::window::SearchWindow;
use tracing::{debug, info, instrument, warn};

/// Result ordering requested from the search interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Accuracy,
    Recency,
}

impl SortMode {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortMode::Accuracy => "accuracy",
            SortMode::Recency => "recency",
        }
    }
}

/// One keyword search.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub term: String,
    pub window: SearchWindow,
    pub sort: SortMode,
}

/// A paginated search interface.
pub trait SearchEngine {
    /// Fetch result URLs for `page` (1-based). An empty list means the result
    /// set is exhausted.
    async fn search_page(&self, query: &SearchQuery, page: u32) -> Result<Vec<String>, CrawlError>;
}

/// Why collection ended.
#[derive(Debug)]
pub enum StopReason {
    TargetReached,
    RepeatSeen,
    Exhausted,
    PageLimit,
    Failed(CrawlError),
}

/// URLs gathered for one query, in discovery order.
#[derive(Debug)]
pub struct Collected {
    pub urls: Vec<String>,
    pub stop: StopReason,
}

impl Collected {
    /// The error that cut the search short, if it did not reach a natural end.
    pub fn failure(&self) -> Option<&CrawlError> {
        match &self.stop {
            StopReason::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Collect up to `target` unique URLs for `query`.
///
/// # Arguments
///
/// * `engine` - Search interface to page through
/// * `query` - Term, window and sort order
/// * `target` - URLs wanted; `0` returns immediately without a request
/// * `max_pages` - Last page that may be requested
///
/// # Returns
///
/// The URLs in discovery order and why collection stopped. Page failures are
/// reported through [`StopReason::Failed`], never as an `Err`.
#[instrument(
    level = "info",
    skip_all,
    fields(term = %query.term, wanted = target, max_pages = max_pages)
)]
pub async fn collect_urls<S: SearchEngine>(
    engine: &S,
    query: &SearchQuery,
    target: usize,
    max_pages: u32,
) -> Collected {
    let mut urls: Vec<String> = Vec::with_capacity(target);
    if target == 0 {
        return Collected {
            urls,
            stop: StopReason::TargetReached,
        };
    }

    for page in 1..=max_pages {
        let page_urls = match engine.search_page(query, page).await {
            Ok(page_urls) => page_urls,
            Err(e) => {
                warn!(
                    page,
                    error = %e,
                    collected = urls.len(),
                    "Search page failed; keeping partial results"
                );
                return Collected {
                    urls,
                    stop: StopReason::Failed(e),
                };
            }
        };

        if page_urls.is_empty() {
            debug!(page, "Search results exhausted");
            return Collected {
                urls,
                stop: StopReason::Exhausted,
            };
        }

        for url in page_urls {
            if urls.contains(&url) {
                info!(page, %url, collected = urls.len(), "Repeated result; stopping collection");
                return Collected {
                    urls,
                    stop: StopReason::RepeatSeen,
                };
            }
            debug!(page, %url, "Collected URL");
            urls.push(url);
            if urls.len() >= target {
                return Collected {
                    urls,
                    stop: StopReason::TargetReached,
                };
            }
        }
    }

    warn!(collected = urls.len(), "Page limit reached before target");
    Collected {
        urls,
        stop: StopReason::PageLimit,
    }
}
