use std::sync::Arc;
use tracing::{debug, error, info};

use crate::bail;
use crate::config::{TaskConfig, fill_in_properties};
use crate::datasource::{DataSourceFactories, DataSourceManager};
use crate::error::{ErrorKind, ScalingResult};
use crate::job::checker::CheckerRegistry;
use crate::job::position::PositionInitializerRegistry;
use crate::job::splitter::InventoryTaskSplitter;
use crate::job::task::{
    DefaultScalingTaskFactory, IncrementalTask, InventoryTask, ScalingTaskFactory,
};
use crate::types::{JobStatus, Position, ScalingJob};

/// Everything preparation produces, written to the job only once all steps succeeded.
struct PreparedTasks {
    task_configs: Vec<TaskConfig>,
    incremental_tasks: Vec<IncrementalTask>,
    inventory_tasks: Vec<InventoryTask>,
}

/// Turns a configured [`ScalingJob`] into a runnable one.
///
/// Preparation validates the data sources, captures the fence point of every source and
/// plans the incremental and inventory tasks. A preparer holds no per-job state and can be
/// shared between concurrent callers.
#[derive(Debug, Clone)]
pub struct ScalingJobPreparer {
    data_source_factories: Arc<DataSourceFactories>,
    checkers: Arc<CheckerRegistry>,
    position_initializers: Arc<PositionInitializerRegistry>,
    task_factory: Arc<dyn ScalingTaskFactory>,
    inventory_task_splitter: InventoryTaskSplitter,
}

impl ScalingJobPreparer {
    pub fn new(
        data_source_factories: DataSourceFactories,
        checkers: CheckerRegistry,
        position_initializers: PositionInitializerRegistry,
    ) -> Self {
        let task_factory: Arc<dyn ScalingTaskFactory> = Arc::new(DefaultScalingTaskFactory);

        Self {
            data_source_factories: Arc::new(data_source_factories),
            checkers: Arc::new(checkers),
            position_initializers: Arc::new(position_initializers),
            inventory_task_splitter: InventoryTaskSplitter::new(task_factory.clone()),
            task_factory,
        }
    }

    /// Replaces the factory building incremental and inventory tasks.
    pub fn with_task_factory(mut self, task_factory: Arc<dyn ScalingTaskFactory>) -> Self {
        self.inventory_task_splitter = InventoryTaskSplitter::new(task_factory.clone());
        self.task_factory = task_factory;
        self
    }

    /// Prepares `job`.
    ///
    /// On success the normalized task configs, with the fence point of each source, and the
    /// planned tasks are written to the job and its status is left as is. On failure the
    /// failure is logged, the status becomes [`JobStatus::PreparingFailure`] and the task
    /// lists are not touched. Every pool opened during the call is closed, and the close
    /// awaited, before it returns.
    #[tracing::instrument(skip_all, fields(job_id = job.job_id))]
    pub async fn prepare(&self, job: &mut ScalingJob) {
        info!(task_configs = job.task_configs.len(), "preparing scaling job");

        match self.try_prepare(job).await {
            Ok(prepared) => {
                info!(
                    incremental_tasks = prepared.incremental_tasks.len(),
                    inventory_tasks = prepared.inventory_tasks.len(),
                    "scaling job prepared"
                );

                job.task_configs = prepared.task_configs;
                job.incremental_tasks = prepared.incremental_tasks;
                job.inventory_tasks = prepared.inventory_tasks;
            }
            Err(err) => {
                error!(
                    job_id = job.job_id,
                    error = %err,
                    category = ?err.category(),
                    "preparing scaling job failed"
                );

                job.status = JobStatus::PreparingFailure;
            }
        }
    }

    async fn try_prepare(&self, job: &ScalingJob) -> ScalingResult<PreparedTasks> {
        let mut task_configs = fill_in_properties(job)?;

        let mut data_source_manager =
            DataSourceManager::new(self.data_source_factories.clone(), &task_configs).await?;

        let result = self
            .plan_tasks(job, &mut task_configs, &mut data_source_manager)
            .await;
        data_source_manager.close().await;
        let (incremental_tasks, inventory_tasks) = result?;

        Ok(PreparedTasks {
            task_configs,
            incremental_tasks,
            inventory_tasks,
        })
    }

    async fn plan_tasks(
        &self,
        job: &ScalingJob,
        task_configs: &mut [TaskConfig],
        data_source_manager: &mut DataSourceManager,
    ) -> ScalingResult<(Vec<IncrementalTask>, Vec<InventoryTask>)> {
        self.check_data_sources(job, task_configs, data_source_manager)
            .await?;

        let incremental_tasks = self
            .init_incremental_tasks(job, task_configs, data_source_manager)
            .await?;
        let inventory_tasks = self
            .init_inventory_tasks(job, task_configs, data_source_manager)
            .await?;

        Ok((incremental_tasks, inventory_tasks))
    }

    async fn check_data_sources(
        &self,
        job: &ScalingJob,
        task_configs: &[TaskConfig],
        data_source_manager: &DataSourceManager,
    ) -> ScalingResult<()> {
        let checker = self.checkers.get(&job.database_type)?;

        let sources = data_source_manager.source_data_sources();
        checker
            .check_connection(&data_source_manager.cached_data_sources())
            .await?;
        checker.check_privilege(&sources).await?;
        checker.check_variable(&sources).await?;
        debug!(sources = sources.len(), "source data sources checked");

        let targets = data_source_manager.target_data_sources();
        if let Some(task_config) = task_configs.first() {
            checker
                .check_target_table(&targets, &task_config.importer_config.sharding_columns)
                .await?;
        }
        debug!(targets = targets.len(), "target data sources checked");

        Ok(())
    }

    /// Resolves the fence point of every source. No inventory split reads source data
    /// before all of them are known.
    async fn init_incremental_tasks(
        &self,
        job: &ScalingJob,
        task_configs: &mut [TaskConfig],
        data_source_manager: &mut DataSourceManager,
    ) -> ScalingResult<Vec<IncrementalTask>> {
        let mut incremental_tasks = Vec::with_capacity(task_configs.len());
        for task_config in task_configs.iter_mut() {
            let position = self
                .init_position(job, task_config, data_source_manager)
                .await?;
            task_config.dumper_config.position = Some(position);

            incremental_tasks.push(self.task_factory.create_incremental_task(
                task_config.job_config.concurrency,
                task_config.dumper_config.clone(),
                task_config.importer_config.clone(),
            ));
        }

        Ok(incremental_tasks)
    }

    async fn init_position(
        &self,
        job: &ScalingJob,
        task_config: &TaskConfig,
        data_source_manager: &mut DataSourceManager,
    ) -> ScalingResult<Position> {
        let data_source_name = task_config.dumper_config.data_source_name.as_str();

        if let Some(init_position) = &job.init_position {
            let Some(position) = init_position.incremental_position(data_source_name) else {
                bail!(
                    ErrorKind::MissingSavedPosition,
                    "Saved positions lack a data source",
                    format!("no saved incremental position for '{data_source_name}'")
                );
            };
            info!(data_source_name, %position, "resuming from saved position");

            return Ok(position.clone());
        }

        let position_initializer = self
            .position_initializers
            .get(&task_config.job_config.database_type)?;
        let data_source =
            data_source_manager.get_data_source(&task_config.dumper_config.data_source)?;
        let position = position_initializer
            .init(job.job_id, data_source.as_ref())
            .await?;
        info!(data_source_name, %position, "captured fence point");

        Ok(position)
    }

    async fn init_inventory_tasks(
        &self,
        job: &ScalingJob,
        task_configs: &[TaskConfig],
        data_source_manager: &mut DataSourceManager,
    ) -> ScalingResult<Vec<InventoryTask>> {
        let mut inventory_tasks = Vec::new();
        for task_config in task_configs {
            let tasks = self
                .inventory_task_splitter
                .split_inventory_data(job, task_config, data_source_manager)
                .await?;
            inventory_tasks.extend(tasks);
        }

        Ok(inventory_tasks)
    }
}

impl Default for ScalingJobPreparer {
    /// A preparer for the built-in engines.
    fn default() -> Self {
        Self::new(
            DataSourceFactories::with_defaults(),
            CheckerRegistry::with_defaults(),
            PositionInitializerRegistry::with_defaults(),
        )
    }
}
