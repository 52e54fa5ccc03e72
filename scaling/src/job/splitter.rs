use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{InventoryDumperConfig, TaskConfig};
use crate::datasource::{DataSource, DataSourceManager};
use crate::error::{ErrorKind, ScalingResult};
use crate::job::task::{InventoryTask, ScalingTaskFactory};
use crate::scaling_error;
use crate::types::{InventoryPosition, ScalingJob};

/// Partitions the historical data of a task config into inventory tasks.
#[derive(Debug, Clone)]
pub struct InventoryTaskSplitter {
    task_factory: Arc<dyn ScalingTaskFactory>,
}

impl InventoryTaskSplitter {
    pub fn new(task_factory: Arc<dyn ScalingTaskFactory>) -> Self {
        Self { task_factory }
    }

    /// Returns the inventory tasks of every table in the dumper's table name map.
    ///
    /// Tables with inventory positions saved in `job` for this data source keep their saved
    /// partitioning. Other tables are read and split by primary key range.
    pub async fn split_inventory_data(
        &self,
        job: &ScalingJob,
        task_config: &TaskConfig,
        data_source_manager: &mut DataSourceManager,
    ) -> ScalingResult<Vec<InventoryTask>> {
        let dumper_configs = self
            .split_dumper_config(job, task_config, data_source_manager)
            .await?;

        Ok(dumper_configs
            .into_iter()
            .map(|dumper_config| {
                self.task_factory
                    .create_inventory_task(dumper_config, task_config.importer_config.clone())
            })
            .collect())
    }

    async fn split_dumper_config(
        &self,
        job: &ScalingJob,
        task_config: &TaskConfig,
        data_source_manager: &mut DataSourceManager,
    ) -> ScalingResult<Vec<InventoryDumperConfig>> {
        let dumper_config = &task_config.dumper_config;
        let data_source = data_source_manager.get_data_source(&dumper_config.data_source)?;

        let mut dumper_configs = Vec::new();
        for (table_name, logic_table_name) in &dumper_config.table_name_map {
            let metadata = data_source
                .table_metadata(table_name)
                .await?
                .ok_or_else(|| {
                    scaling_error!(
                        ErrorKind::MissingSourceTable,
                        "Source table does not exist",
                        format!(
                            "table '{table_name}' is missing on source '{}'",
                            dumper_config.data_source_name
                        )
                    )
                })?;
            let primary_key = metadata
                .single_integer_primary_key()
                .map(|column| column.name.clone());

            let saved_positions = job
                .init_position
                .as_ref()
                .and_then(|position| {
                    position.inventory_positions(&dumper_config.data_source_name, table_name)
                });
            let positions = match saved_positions {
                Some(positions) => {
                    info!(
                        table_name,
                        splits = positions.len(),
                        "resuming inventory from saved positions"
                    );
                    positions.to_vec()
                }
                None => {
                    self.split_by_primary_key(
                        data_source.as_ref(),
                        table_name,
                        primary_key.as_deref(),
                        task_config.job_config.concurrency,
                    )
                    .await?
                }
            };

            for (split_index, position) in positions.into_iter().enumerate() {
                dumper_configs.push(InventoryDumperConfig {
                    data_source_name: dumper_config.data_source_name.clone(),
                    data_source: dumper_config.data_source.clone(),
                    table_name: table_name.clone(),
                    logic_table_name: logic_table_name.clone(),
                    primary_key: primary_key.clone(),
                    split_index,
                    position,
                });
            }
        }

        Ok(dumper_configs)
    }

    async fn split_by_primary_key(
        &self,
        data_source: &dyn DataSource,
        table_name: &str,
        primary_key: Option<&str>,
        concurrency: usize,
    ) -> ScalingResult<Vec<InventoryPosition>> {
        let Some(primary_key) = primary_key.filter(|_| concurrency > 1) else {
            return Ok(vec![InventoryPosition::Placeholder]);
        };

        let Some((min, max)) = data_source
            .primary_key_range(table_name, primary_key)
            .await?
        else {
            debug!(table_name, "table is empty, copying it as a whole");
            return Ok(vec![InventoryPosition::Placeholder]);
        };

        let positions = split_primary_key_range(min, max, concurrency);
        debug!(table_name, min, max, splits = positions.len(), "split table by primary key");

        Ok(positions)
    }
}

/// Splits `min..=max` into at most `concurrency` contiguous, non-overlapping ranges.
///
/// Every range but the last spans `(max - min) / concurrency + 1` keys, the last one takes
/// the remainder. Fewer ranges are returned when there are fewer keys than `concurrency`.
pub fn split_primary_key_range(min: i64, max: i64, concurrency: usize) -> Vec<InventoryPosition> {
    let concurrency = concurrency.max(1);
    let (min, max) = (i128::from(min), i128::from(max));
    let step = (max - min) / concurrency as i128;

    let mut positions = Vec::with_capacity(concurrency);
    let mut begin = min;
    for split in 0..concurrency {
        if begin > max {
            break;
        }

        let end = if split + 1 < concurrency {
            (begin + step).min(max)
        } else {
            max
        };
        // Both bounds lie within the original i64 range.
        positions.push(InventoryPosition::PrimaryKey {
            begin: begin as i64,
            end: end as i64,
        });
        begin = end + 1;
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(positions: &[InventoryPosition]) -> Vec<(i64, i64)> {
        positions
            .iter()
            .map(|position| match position {
                InventoryPosition::PrimaryKey { begin, end } => (*begin, *end),
                other => panic!("unexpected position {other:?}"),
            })
            .collect()
    }

    #[test]
    fn splits_evenly_into_concurrency_ranges() {
        let positions = split_primary_key_range(1, 100, 4);

        assert_eq!(
            ranges(&positions),
            vec![(1, 25), (26, 50), (51, 75), (76, 100)]
        );
    }

    #[test]
    fn last_range_takes_the_remainder() {
        let positions = split_primary_key_range(0, 10, 3);

        assert_eq!(ranges(&positions), vec![(0, 3), (4, 7), (8, 10)]);
    }

    #[test]
    fn fewer_keys_than_concurrency_yield_fewer_ranges() {
        assert_eq!(ranges(&split_primary_key_range(1, 2, 4)), vec![(1, 1), (2, 2)]);
        assert_eq!(ranges(&split_primary_key_range(5, 5, 3)), vec![(5, 5)]);
    }

    #[test]
    fn ranges_cover_the_key_space_without_overlap() {
        for (min, max, concurrency) in [(1, 1000, 7), (-50, 50, 3), (0, 9, 10), (3, 1_000_003, 16)] {
            let ranges = ranges(&split_primary_key_range(min, max, concurrency));

            assert!(ranges.len() <= concurrency);
            assert_eq!(ranges.first().unwrap().0, min);
            assert_eq!(ranges.last().unwrap().1, max);
            for window in ranges.windows(2) {
                assert_eq!(window[0].1 + 1, window[1].0);
            }
        }
    }

    #[test]
    fn handles_the_full_i64_range() {
        let ranges = ranges(&split_primary_key_range(i64::MIN, i64::MAX, 2));

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].0, i64::MIN);
        assert_eq!(ranges[1].1, i64::MAX);
        assert_eq!(ranges[0].1 + 1, ranges[1].0);
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(
            split_primary_key_range(17, 9_999, 5),
            split_primary_key_range(17, 9_999, 5)
        );
    }
}
