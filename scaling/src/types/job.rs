use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::TaskConfig;
use crate::job::task::{IncrementalTask, InventoryTask};
use crate::types::JobPosition;

/// Identifier of a scaling job.
pub type JobId = u64;

/// Lifecycle state of a scaling job as seen by the scheduler.
///
/// Preparation only ever moves a job to [`JobStatus::PreparingFailure`], every other
/// transition belongs to the executor.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Preparing,
    Running,
    ExecuteInventoryTask,
    ExecuteIncrementalTask,
    AlmostFinished,
    Finished,
    Stopped,
    PreparingFailure,
    ExecuteInventoryTaskFailure,
    ExecuteIncrementalTaskFailure,
}

impl JobStatus {
    /// Returns `true` if the job ended in an error state and has no usable tasks.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::PreparingFailure
                | Self::ExecuteInventoryTaskFailure
                | Self::ExecuteIncrementalTaskFailure
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preparing => write!(f, "PREPARING"),
            Self::Running => write!(f, "RUNNING"),
            Self::ExecuteInventoryTask => write!(f, "EXECUTE_INVENTORY_TASK"),
            Self::ExecuteIncrementalTask => write!(f, "EXECUTE_INCREMENTAL_TASK"),
            Self::AlmostFinished => write!(f, "ALMOST_FINISHED"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::PreparingFailure => write!(f, "PREPARING_FAILURE"),
            Self::ExecuteInventoryTaskFailure => write!(f, "EXECUTE_INVENTORY_TASK_FAILURE"),
            Self::ExecuteIncrementalTaskFailure => write!(f, "EXECUTE_INCREMENTAL_TASK_FAILURE"),
        }
    }
}

/// A single migration from a set of source datastores to a set of target datastores.
///
/// The job is created before preparation, mutated only by the preparer while it runs and
/// handed to the executor afterwards. When [`ScalingJob::status`] is a failure the task
/// lists must be treated as empty.
#[derive(Debug, Clone)]
pub struct ScalingJob {
    pub job_id: JobId,
    /// Engine variant of the sources, selects checkers and position initializers.
    pub database_type: String,
    pub status: JobStatus,
    pub task_configs: Vec<TaskConfig>,
    /// Checkpoints saved by a previous attempt, present when resuming.
    pub init_position: Option<JobPosition>,
    pub inventory_tasks: Vec<InventoryTask>,
    pub incremental_tasks: Vec<IncrementalTask>,
}

impl ScalingJob {
    pub fn new(
        job_id: JobId,
        database_type: impl Into<String>,
        task_configs: Vec<TaskConfig>,
    ) -> Self {
        Self {
            job_id,
            database_type: database_type.into(),
            status: JobStatus::Preparing,
            task_configs,
            init_position: None,
            inventory_tasks: Vec::new(),
            incremental_tasks: Vec::new(),
        }
    }

    pub fn with_init_position(mut self, init_position: JobPosition) -> Self {
        self.init_position = Some(init_position);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_failure_states_are_failures() {
        assert!(JobStatus::PreparingFailure.is_failure());
        assert!(JobStatus::ExecuteIncrementalTaskFailure.is_failure());
        assert!(!JobStatus::Preparing.is_failure());
        assert!(!JobStatus::Running.is_failure());
    }

    #[test]
    fn display_matches_serialized_name() {
        let serialized = serde_json::to_string(&JobStatus::PreparingFailure).unwrap();

        assert_eq!(serialized, format!("\"{}\"", JobStatus::PreparingFailure));
    }

    #[test]
    fn new_job_starts_preparing_without_tasks() {
        let job = ScalingJob::new(7, "Memory", vec![]);

        assert_eq!(job.status, JobStatus::Preparing);
        assert!(job.inventory_tasks.is_empty());
        assert!(job.incremental_tasks.is_empty());
        assert!(job.init_position.is_none());
    }
}
