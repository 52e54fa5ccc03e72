use anyhow::{Context, bail};
use scaling::config::task_configs_from_settings;
use scaling::job::ScalingJobPreparer;
use scaling::types::{JobPosition, JobStatus, ScalingJob};
use scaling_config::shared::{DataSourceConfig, JobSettings, ScalingConfig, TaskSettings};
use std::path::Path;
use tracing::{debug, info};

/// Builds the scaling job described by `scaling_config` and prepares it.
///
/// Returns the prepared job, or an error if the configuration could not be turned into a
/// job or preparation ended in [`JobStatus::PreparingFailure`].
pub async fn prepare_job_with_config(scaling_config: ScalingConfig) -> anyhow::Result<ScalingJob> {
    info!("starting scaling job preparation");

    log_config(&scaling_config);

    let mut job = build_job(&scaling_config).await?;

    let preparer = ScalingJobPreparer::default();
    preparer.prepare(&mut job).await;

    if job.status == JobStatus::PreparingFailure {
        bail!("scaling job {} could not be prepared", job.job_id);
    }

    log_prepared_job(&job);
    info!("scaling job preparation completed");

    Ok(job)
}

async fn build_job(scaling_config: &ScalingConfig) -> anyhow::Result<ScalingJob> {
    let job = ScalingJob::new(
        scaling_config.job.id,
        scaling_config.job.database_type.clone(),
        task_configs_from_settings(scaling_config),
    );

    match &scaling_config.job.init_position_file {
        Some(path) => {
            let init_position = load_init_position(path).await?;
            info!(path = %path.display(), "resuming scaling job from saved positions");

            Ok(job.with_init_position(init_position))
        }
        None => Ok(job),
    }
}

async fn load_init_position(path: &Path) -> anyhow::Result<JobPosition> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read saved positions from {}", path.display()))?;

    Ok(JobPosition::from_json(&json)?)
}

fn log_config(config: &ScalingConfig) {
    log_job_settings(&config.job);
    for task in &config.tasks {
        log_task_settings(task);
    }
}

fn log_job_settings(settings: &JobSettings) {
    debug!(
        job_id = settings.id,
        database_type = settings.database_type,
        concurrency = settings.concurrency,
        retry_times = settings.retry_times,
        "job config"
    );
}

fn log_task_settings(settings: &TaskSettings) {
    debug!(
        source_name = settings.source_name,
        tables = settings.sharding_columns.len(),
        "task config"
    );
    log_data_source_config("source", &settings.source);
    log_data_source_config("target", &settings.target);
}

fn log_data_source_config(role: &str, config: &DataSourceConfig) {
    debug!(
        role,
        database_type = config.database_type,
        username = config.username,
        max_connections = config.max_connections,
        "data source config"
    );
}

fn log_prepared_job(job: &ScalingJob) {
    for task in &job.incremental_tasks {
        info!(
            task_id = task.task_id(),
            concurrency = task.concurrency(),
            start_position = task.start_position().map(|position| position.as_str()),
            "incremental task"
        );
    }
    for task in &job.inventory_tasks {
        debug!(
            task_id = task.task_id(),
            position = %task.dumper_config().position,
            "inventory task"
        );
    }
    info!(
        job_id = job.job_id,
        status = %job.status,
        incremental_tasks = job.incremental_tasks.len(),
        inventory_tasks = job.inventory_tasks.len(),
        "scaling job ready"
    );
}
