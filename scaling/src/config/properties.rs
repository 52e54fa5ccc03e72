use crate::bail;
use crate::config::{DEFAULT_RETRY_TIMES, DumperConfig, ImporterConfig, JobConfig, TaskConfig};
use crate::error::{ErrorKind, ScalingResult};
use crate::types::ScalingJob;

/// Returns the job's task configs with every derived property filled in.
///
/// The job itself is not modified, the preparer stores the returned configs only once the
/// whole preparation succeeded. Filling is idempotent.
pub fn fill_in_properties(job: &ScalingJob) -> ScalingResult<Vec<TaskConfig>> {
    if job.task_configs.is_empty() {
        bail!(
            ErrorKind::InvalidConfiguration,
            "Scaling job has no task configurations",
            format!("job {} must contain at least one task configuration", job.job_id)
        );
    }

    let mut task_configs = job.task_configs.clone();
    for task_config in &mut task_configs {
        fill_in_job_config(job, &mut task_config.job_config)?;
        fill_in_dumper_config(&mut task_config.dumper_config, &task_config.importer_config);

        if task_config.importer_config.retry_times == 0 {
            task_config.importer_config.retry_times = task_config.job_config.retry_times;
        }
    }

    Ok(task_configs)
}

fn fill_in_job_config(job: &ScalingJob, job_config: &mut JobConfig) -> ScalingResult<()> {
    if job_config.concurrency == 0 {
        bail!(
            ErrorKind::InvalidConfiguration,
            "Concurrency must be greater than zero",
            format!("job {} has a task configuration with zero concurrency", job.job_id)
        );
    }

    job_config.job_id = job.job_id;
    if job_config.database_type.is_empty() {
        job_config.database_type = job.database_type.clone();
    }
    if job_config.retry_times == 0 {
        job_config.retry_times = DEFAULT_RETRY_TIMES;
    }

    Ok(())
}

/// Without an explicit mapping every sharding table is read under its own name.
fn fill_in_dumper_config(dumper_config: &mut DumperConfig, importer_config: &ImporterConfig) {
    if dumper_config.table_name_map.is_empty() {
        dumper_config.table_name_map = importer_config
            .sharding_columns
            .keys()
            .map(|table| (table.clone(), table.clone()))
            .collect();
    }
}
