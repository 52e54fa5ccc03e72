//! Task level configuration of a scaling job.
//!
//! A [`TaskConfig`] describes one source to target data flow. The preparer normalizes the
//! configurations with [`fill_in_properties`] and records the fence point of every source
//! in [`DumperConfig::position`].

mod properties;

use scaling_config::shared::{DataSourceConfig, ScalingConfig};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{InventoryPosition, JobId, Position};

pub use properties::*;

/// Retries an importer performs when neither the task nor the job sets a value.
pub const DEFAULT_RETRY_TIMES: u32 = 3;

/// Job level settings copied into every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub job_id: JobId,
    pub database_type: String,
    /// Upper bound of partitions per table for the inventory copy and of parallel appliers
    /// for the incremental task.
    pub concurrency: usize,
    pub retry_times: u32,
}

/// Where and from which checkpoint a task reads.
#[derive(Debug, Clone)]
pub struct DumperConfig {
    /// Logical name of the source, saved checkpoints are keyed by it.
    pub data_source_name: String,
    pub data_source: DataSourceConfig,
    /// Actual table name to logic table name.
    pub table_name_map: BTreeMap<String, String>,
    /// Fence point of the source, filled in during preparation.
    pub position: Option<Position>,
}

/// Where a task writes and what the target schema has to provide.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    pub data_source: DataSourceConfig,
    /// Logic table name to the sharding columns required on the target.
    pub sharding_columns: BTreeMap<String, BTreeSet<String>>,
    pub retry_times: u32,
}

/// Dumper settings of a single inventory unit: one table, one key range.
#[derive(Debug, Clone)]
pub struct InventoryDumperConfig {
    pub data_source_name: String,
    pub data_source: DataSourceConfig,
    pub table_name: String,
    pub logic_table_name: String,
    /// Integer primary key the range in `position` applies to.
    pub primary_key: Option<String>,
    pub split_index: usize,
    pub position: InventoryPosition,
}

/// One source to target data flow of a scaling job.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub job_config: JobConfig,
    pub dumper_config: DumperConfig,
    pub importer_config: ImporterConfig,
}

impl TaskConfig {
    /// Creates a task config whose derived fields are left for [`fill_in_properties`].
    pub fn new(
        concurrency: usize,
        data_source_name: impl Into<String>,
        source: DataSourceConfig,
        target: DataSourceConfig,
        sharding_columns: BTreeMap<String, BTreeSet<String>>,
    ) -> Self {
        Self {
            job_config: JobConfig {
                job_id: 0,
                database_type: String::new(),
                concurrency,
                retry_times: 0,
            },
            dumper_config: DumperConfig {
                data_source_name: data_source_name.into(),
                data_source: source,
                table_name_map: BTreeMap::new(),
                position: None,
            },
            importer_config: ImporterConfig {
                data_source: target,
                sharding_columns,
                retry_times: 0,
            },
        }
    }
}

/// Builds the task configs described by a loaded [`ScalingConfig`].
pub fn task_configs_from_settings(config: &ScalingConfig) -> Vec<TaskConfig> {
    config
        .tasks
        .iter()
        .map(|task| {
            let mut task_config = TaskConfig::new(
                config.job.concurrency,
                task.source_name.clone(),
                task.source.clone(),
                task.target.clone(),
                task.sharding_columns.clone(),
            );
            task_config.job_config.job_id = config.job.id;
            task_config.job_config.database_type = config.job.database_type.clone();
            task_config.job_config.retry_times = config.job.retry_times;

            task_config
        })
        .collect()
}
