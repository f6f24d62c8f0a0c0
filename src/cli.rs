//! Command-line interface definitions for the news crawler.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can also come from the environment (or a `.env` file loaded at
//! startup), which is how the crawler is configured in deployment.

use crate::error::CrawlError;
use crate::fetch::RequestDelay;
use crate::window::LOOKBACK_HOURS;
use clap::{Parser, ValueEnum};
use itertools::Itertools;
use std::fmt;
use std::time::Duration;

/// One crawl run kind. Each produces a single ingestion batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Source {
    /// Daum search for the backend's keyword list
    KeywordNews,
    /// Daum search for a fixed list of financial institutions plus "AI"
    FinanceAi,
    /// Daum section front pages
    MainNews,
    /// AI Times latest articles
    AiTimes,
    /// Boan News latest articles
    BoanNews,
}

impl Source {
    pub const ALL: [Source; 5] = [
        Source::KeywordNews,
        Source::MainNews,
        Source::AiTimes,
        Source::FinanceAi,
        Source::BoanNews,
    ];
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::KeywordNews => "keyword-news",
            Source::FinanceAi => "finance-ai",
            Source::MainNews => "main-news",
            Source::AiTimes => "ai-times",
            Source::BoanNews => "boan-news",
        };
        f.write_str(name)
    }
}

/// Command-line arguments for the crawler.
///
/// # Examples
///
/// ```sh
/// # Scheduled mode against a local backend
/// kr_news_crawler
///
/// # One immediate keyword run against a staging backend
/// kr_news_crawler -i --source keyword-news --backend-url https://staging.example
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Run the selected sources once and exit instead of scheduling them
    #[arg(short, long)]
    pub immediate: bool,

    /// Sources to crawl (repeatable); all sources when omitted
    #[arg(short, long = "source", value_enum)]
    pub sources: Vec<Source>,

    /// Base URL of the news backend
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:3000")]
    pub backend_url: String,

    /// Lower bound in seconds of the pause before each request
    #[arg(long, env = "CRAWL_SLEEP_MIN", default_value_t = 1.0)]
    pub sleep_min: f64,

    /// Upper bound in seconds of the pause before each request
    #[arg(long, env = "CRAWL_SLEEP_MAX", default_value_t = 3.0)]
    pub sleep_max: f64,

    /// URLs collected per keyword for the keyword news run
    #[arg(long, env = "ARTICLES_PER_KEYWORD", default_value_t = 10)]
    pub articles_per_keyword: usize,

    /// Upper bound on search result pages walked per keyword
    #[arg(long, env = "CRAWL_MAX_PAGES", default_value_t = 20)]
    pub max_pages: u32,
}

/// Validated runtime settings handed to every run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub immediate: bool,
    pub sources: Vec<Source>,
    pub backend_url: String,
    pub delay: RequestDelay,
    pub articles_per_keyword: usize,
    pub max_pages: u32,
    pub lookback: chrono::Duration,
}

fn seconds(name: &str, value: f64) -> Result<Duration, CrawlError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| CrawlError::Config(format!("{name}={value}: {e}")))
}

impl TryFrom<Cli> for Settings {
    type Error = CrawlError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.max_pages == 0 {
            return Err(CrawlError::Config("max pages must be at least 1".to_string()));
        }
        let delay = RequestDelay::new(
            seconds("sleep min", cli.sleep_min)?,
            seconds("sleep max", cli.sleep_max)?,
        );

        let sources = if cli.sources.is_empty() {
            Source::ALL.to_vec()
        } else {
            cli.sources.into_iter().unique().collect()
        };

        Ok(Settings {
            immediate: cli.immediate,
            sources,
            backend_url: cli.backend_url,
            delay,
            articles_per_keyword: cli.articles_per_keyword,
            max_pages: cli.max_pages,
            lookback: chrono::Duration::hours(LOOKBACK_HOURS),
        })
    }
}
