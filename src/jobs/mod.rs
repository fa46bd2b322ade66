//! Background job scheduling

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::config::Config;
use crate::services::{GenerationRequest, GeneratorService, PlexClient};

/// Start the job scheduler when a regeneration cron is configured. With no
/// GENERATE_CRON set, generation stays on-demand only.
pub async fn start_scheduler(
    generator: Arc<GeneratorService<PlexClient>>,
    config: Arc<Config>,
) -> anyhow::Result<Option<JobScheduler>> {
    let Some(cron) = config.generate_cron.clone() else {
        info!("GENERATE_CRON not set; scheduled regeneration disabled");
        return Ok(None);
    };

    let scheduler = JobScheduler::new().await?;

    let job_generator = generator.clone();
    let job_config = config.clone();
    let regenerate_job = Job::new_async(cron.as_str(), move |_uuid, _l| {
        let generator = job_generator.clone();
        let config = job_config.clone();
        Box::pin(async move {
            info!("Running scheduled playlist regeneration");
            let request = GenerationRequest {
                library_names: config.libraries.clone(),
                allowed_ratings: config.allowed_ratings.clone(),
                weeks_per_year: config.weeks_per_year,
                playlist_title_prefix: config.playlist_prefix.clone(),
            };
            match generator.generate(request).await {
                Ok(report) => info!(
                    created = report.weeks_created,
                    replaced = report.weeks_replaced,
                    unchanged = report.weeks_unchanged,
                    failed = report.weeks_failed,
                    "Scheduled regeneration finished"
                ),
                Err(e) => tracing::error!("Scheduled regeneration error: {}", e),
            }
        })
    })?;
    scheduler.add(regenerate_job).await?;

    scheduler.start().await?;

    info!(cron = %cron, "Job scheduler started");
    Ok(Some(scheduler))
}
