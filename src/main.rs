//! # KR News Crawler
//!
//! Collects Korean news articles for a backend service. Each run discovers
//! article URLs from one source, fetches and extracts every unique article
//! once, records which keywords surfaced it, and posts the deduplicated batch
//! to the backend.
//!
//! ## Sources
//!
//! - Daum keyword search for the backend's keyword list, with per-keyword
//!   cursors so each search only covers what is new since the last run
//! - Daum keyword search for financial institutions' AI news
//! - Daum section front pages
//! - AI Times and Boan News latest article listings
//!
//! ## Usage
//!
//! ```sh
//! # Run every source on its schedule
//! kr_news_crawler
//!
//! # Run the keyword and main news crawls once, now
//! kr_news_crawler -i -s keyword-news -s main-news
//! ```
//!
//! ## Architecture
//!
//! 1. **Discovery**: search pages, section pages or listings yield URLs
//! 2. **Merge**: each URL is fetched at most once per run; later discoveries
//!    only add their keyword
//! 3. **Delivery**: one batch per run to the ingestion endpoint, plus cursor
//!    updates after each completed keyword

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod backend;
mod cli;
mod collector;
mod error;
mod fetch;
mod merge;
mod models;
mod orchestrator;
mod schedule;
mod sources;
#[cfg(test)]
mod testing;
mod utils;
mod window;

use backend::BackendClient;
use cli::{Cli, Settings, Source};
use fetch::{DEFAULT_USER_AGENT, HttpFetcher};
use orchestrator::{RunReport, RunStatus};
use sources::daum::{DaumArticles, DaumSearch};
use utils::seoul_now;

/// Clients shared by every run.
struct Crawler {
    settings: Settings,
    backend: BackendClient,
    fetcher: HttpFetcher,
    /// Boan News serves a chain that fails verification.
    insecure_fetcher: HttpFetcher,
}

impl Crawler {
    fn new(settings: Settings) -> Result<Self, error::CrawlError> {
        Ok(Self {
            backend: BackendClient::new(&settings.backend_url)?,
            fetcher: HttpFetcher::new(DEFAULT_USER_AGENT, settings.delay)?,
            insecure_fetcher: HttpFetcher::insecure(DEFAULT_USER_AGENT, settings.delay)?,
            settings,
        })
    }

    async fn run(&self, source: Source) -> RunReport {
        let start_time = seoul_now();
        let search = DaumSearch::new(&self.fetcher);
        let articles = DaumArticles::new(&self.fetcher);
        let (backend, settings) = (&self.backend, &self.settings);
        match source {
            Source::KeywordNews => {
                orchestrator::run_keyword_news(backend, &search, &articles, settings, start_time)
                    .await
            }
            Source::FinanceAi => {
                orchestrator::run_finance_ai(backend, &search, &articles, settings, start_time)
                    .await
            }
            Source::MainNews => {
                orchestrator::run_main_news(backend, &self.fetcher, &articles).await
            }
            Source::AiTimes => {
                orchestrator::run_aitimes(backend, &self.fetcher, settings, start_time).await
            }
            Source::BoanNews => {
                let fetcher = &self.insecure_fetcher;
                orchestrator::run_boan_news(backend, fetcher, settings, start_time).await
            }
        }
    }

    async fn run_all(&self, sources: &[Source]) {
        for source in sources {
            let report = self.run(*source).await;
            if report.status == RunStatus::Aborted {
                warn!(%source, "Run aborted before collecting anything");
            }
        }
    }
}

/// Registers every selected source with the cron scheduler and keeps it
/// running until Ctrl-C.
#[instrument(level = "info", skip_all)]
async fn run_scheduled(crawler: Arc<Crawler>) -> Result<(), Box<dyn Error>> {
    let sources = crawler.settings.sources.clone();
    let mut scheduler = schedule::start(&sources, move |source| {
        let crawler = Arc::clone(&crawler);
        async move { crawler.run_all(&[source]).await }
    })
    .await?;
    info!(sources = ?sources, "Scheduler running; Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down scheduler");
    scheduler.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env is fine; the environment and flags still apply.
    let dotenv = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let settings = Settings::try_from(Cli::parse())?;
    info!(
        backend = %settings.backend_url,
        immediate = settings.immediate,
        sources = ?settings.sources,
        "kr_news_crawler starting up"
    );

    let immediate = settings.immediate;
    let sources = settings.sources.clone();
    let crawler = Crawler::new(settings)?;

    if immediate {
        info!("Immediate mode: running selected sources once");
        crawler.run_all(&sources).await;
        Ok(())
    } else {
        run_scheduled(Arc::new(crawler)).await
    }
}
