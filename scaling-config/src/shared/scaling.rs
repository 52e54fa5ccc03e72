use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;

use crate::Config;
use crate::shared::{DataSourceConfig, ValidationError};

/// Number of partitions a table is split into when none is configured.
const DEFAULT_CONCURRENCY: usize = 3;

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Complete configuration of a scaling job as read by the preparer binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScalingConfig {
    pub job: JobSettings,
    /// One entry per source to target data flow.
    pub tasks: Vec<TaskSettings>,
}

/// Job wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobSettings {
    pub id: u64,
    /// Engine variant of the source datastores, used to pick checkers and position
    /// initializers.
    pub database_type: String,
    /// Partitions per table for the historical copy.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Retries the importer performs before giving up on a batch, zero picks the default.
    #[serde(default)]
    pub retry_times: u32,
    /// JSON file holding the checkpoint set saved by a previous attempt.
    #[serde(default)]
    pub init_position_file: Option<PathBuf>,
}

/// A single source to target data flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskSettings {
    /// Logical name of the source, checkpoints are saved under this name.
    pub source_name: String,
    pub source: DataSourceConfig,
    pub target: DataSourceConfig,
    /// Sharding columns that must exist on each target table.
    pub sharding_columns: BTreeMap<String, BTreeSet<String>>,
}

impl ScalingConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tasks.is_empty() {
            return Err(ValidationError::NoTasks);
        }
        if self.job.concurrency == 0 {
            return Err(ValidationError::ConcurrencyZero);
        }

        let mut source_names = HashSet::new();
        for task in &self.tasks {
            if !source_names.insert(task.source_name.as_str()) {
                return Err(ValidationError::DuplicateSourceName(
                    task.source_name.clone(),
                ));
            }
            if task.sharding_columns.is_empty() {
                return Err(ValidationError::NoShardingTables(task.source_name.clone()));
            }

            task.source.validate(&task.source_name)?;
            task.target
                .validate(&format!("{}_target", task.source_name))?;
        }

        Ok(())
    }
}

impl Config for ScalingConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
