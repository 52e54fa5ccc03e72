use std::fmt;

use crate::config::{DumperConfig, ImporterConfig, InventoryDumperConfig};
use crate::types::Position;

/// Replays the change stream of one source from its fence point.
#[derive(Debug, Clone)]
pub struct IncrementalTask {
    task_id: String,
    concurrency: usize,
    dumper_config: DumperConfig,
    importer_config: ImporterConfig,
}

impl IncrementalTask {
    pub fn new(
        concurrency: usize,
        dumper_config: DumperConfig,
        importer_config: ImporterConfig,
    ) -> Self {
        Self {
            task_id: dumper_config.data_source_name.clone(),
            concurrency,
            dumper_config,
            importer_config,
        }
    }

    /// Equals the name of the source data source.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn dumper_config(&self) -> &DumperConfig {
        &self.dumper_config
    }

    pub fn importer_config(&self) -> &ImporterConfig {
        &self.importer_config
    }

    /// The fence point replication starts from.
    pub fn start_position(&self) -> Option<&Position> {
        self.dumper_config.position.as_ref()
    }
}

/// Copies one key range (or the whole) of a source table.
#[derive(Debug, Clone)]
pub struct InventoryTask {
    task_id: String,
    dumper_config: InventoryDumperConfig,
    importer_config: ImporterConfig,
}

impl InventoryTask {
    pub fn new(dumper_config: InventoryDumperConfig, importer_config: ImporterConfig) -> Self {
        Self {
            task_id: format!(
                "{}.{}#{}",
                dumper_config.data_source_name, dumper_config.table_name, dumper_config.split_index
            ),
            dumper_config,
            importer_config,
        }
    }

    /// `{data source}.{table}#{split index}`.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn dumper_config(&self) -> &InventoryDumperConfig {
        &self.dumper_config
    }

    pub fn importer_config(&self) -> &ImporterConfig {
        &self.importer_config
    }
}

/// Builds task descriptors. Implementations must not perform I/O.
pub trait ScalingTaskFactory: fmt::Debug + Send + Sync {
    fn create_incremental_task(
        &self,
        concurrency: usize,
        dumper_config: DumperConfig,
        importer_config: ImporterConfig,
    ) -> IncrementalTask;

    fn create_inventory_task(
        &self,
        dumper_config: InventoryDumperConfig,
        importer_config: ImporterConfig,
    ) -> InventoryTask;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScalingTaskFactory;

impl ScalingTaskFactory for DefaultScalingTaskFactory {
    fn create_incremental_task(
        &self,
        concurrency: usize,
        dumper_config: DumperConfig,
        importer_config: ImporterConfig,
    ) -> IncrementalTask {
        IncrementalTask::new(concurrency, dumper_config, importer_config)
    }

    fn create_inventory_task(
        &self,
        dumper_config: InventoryDumperConfig,
        importer_config: ImporterConfig,
    ) -> InventoryTask {
        InventoryTask::new(dumper_config, importer_config)
    }
}

#[cfg(test)]
mod tests {
    use scaling_config::shared::DataSourceConfig;
    use std::collections::BTreeMap;

    use super::*;
    use crate::engine::MEMORY;
    use crate::types::InventoryPosition;

    fn importer_config() -> ImporterConfig {
        ImporterConfig {
            data_source: DataSourceConfig::new(MEMORY, "memory://target"),
            sharding_columns: BTreeMap::new(),
            retry_times: 3,
        }
    }

    #[test]
    fn incremental_task_is_named_after_its_source() {
        let dumper_config = DumperConfig {
            data_source_name: "ds_0".to_owned(),
            data_source: DataSourceConfig::new(MEMORY, "memory://ds_0"),
            table_name_map: BTreeMap::new(),
            position: Some(Position::new("42")),
        };

        let task =
            DefaultScalingTaskFactory.create_incremental_task(4, dumper_config, importer_config());

        assert_eq!(task.task_id(), "ds_0");
        assert_eq!(task.concurrency(), 4);
        assert_eq!(task.start_position(), Some(&Position::new("42")));
    }

    #[test]
    fn inventory_task_is_named_after_table_and_split() {
        let dumper_config = InventoryDumperConfig {
            data_source_name: "ds_0".to_owned(),
            data_source: DataSourceConfig::new(MEMORY, "memory://ds_0"),
            table_name: "orders_0".to_owned(),
            logic_table_name: "orders".to_owned(),
            primary_key: Some("order_id".to_owned()),
            split_index: 2,
            position: InventoryPosition::PrimaryKey { begin: 51, end: 75 },
        };

        let task = DefaultScalingTaskFactory.create_inventory_task(dumper_config, importer_config());

        assert_eq!(task.task_id(), "ds_0.orders_0#2");
    }
}
