//! Cron jobs for scheduled mode.
//!
//! | Source | Minute | Hours |
//! |--------|--------|-------|
//! | Keyword news | :00 | every hour |
//! | Main news | :10 | 00, 03, 06, … 21 |
//! | AI Times | :20 | 00, 03, 06, … 21 |
//! | Finance-AI | :30 | 00, 03, 06, … 21 |
//! | Boan News | :40 | 00, 03, 06, … 21 |
//!
//! Times are Seoul local time. Each source is its own job, so sources run
//! independently of each other. A firing that arrives while the previous run
//! of the same source is still going is skipped, not replayed.

use crate::cli::Source;
use crate::utils::seoul;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{info, warn};

/// Six-field cron expression (seconds first) for a source, in Seoul time.
pub fn cron_expression(source: Source) -> &'static str {
    match source {
        Source::KeywordNews => "0 0 * * * *",
        Source::MainNews => "0 10 */3 * * *",
        Source::AiTimes => "0 20 */3 * * *",
        Source::FinanceAi => "0 30 */3 * * *",
        Source::BoanNews => "0 40 */3 * * *",
    }
}

/// Builds the cron job that runs `source` through `run`.
///
/// # Errors
///
/// Returns an error if the scheduler rejects the cron expression.
pub fn job_for<F, Fut>(source: Source, run: Arc<F>) -> Result<Job, JobSchedulerError>
where
    F: Fn(Source) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(Mutex::new(()));
    Job::new_async_tz(cron_expression(source), seoul(), move |_uuid, _lock| {
        let run = Arc::clone(&run);
        let running = Arc::clone(&running);
        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                warn!(%source, "Previous run still going; skipping this firing");
                return;
            };
            info!(%source, "Scheduled run starting");
            (*run)(source).await;
        })
    })
}

/// Registers one job per source and starts the scheduler.
///
/// # Arguments
///
/// * `sources` - Sources to schedule; each gets the cadence from [`cron_expression`]
/// * `run` - Called with the source at every firing
///
/// # Returns
///
/// The running scheduler; call `shutdown` on it to stop the jobs.
///
/// # Errors
///
/// Returns an error if a job cannot be built or the scheduler fails to start.
pub async fn start<F, Fut>(sources: &[Source], run: F) -> Result<JobScheduler, JobSchedulerError>
where
    F: Fn(Source) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let scheduler = JobScheduler::new().await?;
    let run = Arc::new(run);
    for source in sources {
        scheduler.add(job_for(*source, Arc::clone(&run))?).await?;
        info!(%source, cron = cron_expression(*source), "Scheduled source");
    }
    scheduler.start().await?;
    Ok(scheduler)
}
