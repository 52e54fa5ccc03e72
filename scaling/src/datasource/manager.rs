use scaling_config::shared::{DataSourceConfig, DataSourceKey};
use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::TaskConfig;
use crate::datasource::{DataSource, DataSourceFactories};
use crate::error::ScalingResult;

/// Owns the pools opened while preparing one job.
///
/// Pools are shared between task configs whose descriptors resolve to the same
/// [`DataSourceKey`]. Callers release them with [`DataSourceManager::close`], which waits
/// until every pool the manager opened has been closed exactly once.
#[derive(Debug)]
pub struct DataSourceManager {
    factories: Arc<DataSourceFactories>,
    cached: BTreeMap<DataSourceKey, Arc<dyn DataSource>>,
    sources: BTreeMap<DataSourceKey, Arc<dyn DataSource>>,
    targets: BTreeMap<DataSourceKey, Arc<dyn DataSource>>,
}

impl DataSourceManager {
    /// Opens the pools of every source and target referenced by `task_configs`.
    ///
    /// If a pool cannot be created, the pools opened before it are closed before the
    /// error is returned.
    pub async fn new(
        factories: Arc<DataSourceFactories>,
        task_configs: &[TaskConfig],
    ) -> ScalingResult<Self> {
        let mut manager = Self {
            factories,
            cached: BTreeMap::new(),
            sources: BTreeMap::new(),
            targets: BTreeMap::new(),
        };

        if let Err(err) = manager.open_all(task_configs) {
            manager.close().await;
            return Err(err);
        }

        Ok(manager)
    }

    fn open_all(&mut self, task_configs: &[TaskConfig]) -> ScalingResult<()> {
        for task_config in task_configs {
            let config = &task_config.dumper_config.data_source;
            let data_source = self.get_data_source(config)?;
            self.sources.insert(config.key(), data_source);
        }

        for task_config in task_configs {
            let config = &task_config.importer_config.data_source;
            let data_source = self.get_data_source(config)?;
            self.targets.insert(config.key(), data_source);
        }

        Ok(())
    }

    /// Returns the pool for `config`, opening and caching it on first use.
    pub fn get_data_source(
        &mut self,
        config: &DataSourceConfig,
    ) -> ScalingResult<Arc<dyn DataSource>> {
        let key = config.key();
        if let Some(data_source) = self.cached.get(&key) {
            return Ok(data_source.clone());
        }

        let factory = self.factories.get(&config.database_type)?;
        let data_source = factory.create(config)?;
        debug!(database_type = %key.database_type, "opened data source pool");
        self.cached.insert(key, data_source.clone());

        Ok(data_source)
    }

    /// Every pool opened so far, sources and targets alike.
    pub fn cached_data_sources(&self) -> Vec<Arc<dyn DataSource>> {
        self.cached.values().cloned().collect()
    }

    pub fn source_data_sources(&self) -> Vec<Arc<dyn DataSource>> {
        self.sources.values().cloned().collect()
    }

    pub fn target_data_sources(&self) -> Vec<Arc<dyn DataSource>> {
        self.targets.values().cloned().collect()
    }

    /// Closes every pool the manager opened and waits for each of them.
    pub async fn close(mut self) {
        for data_source in self.take_pools() {
            data_source.close().await;
        }
    }

    fn take_pools(&mut self) -> Vec<Arc<dyn DataSource>> {
        self.sources.clear();
        self.targets.clear();

        let cached = mem::take(&mut self.cached);
        if !cached.is_empty() {
            debug!(count = cached.len(), "closing data source pools");
        }

        cached.into_values().collect()
    }
}

impl Drop for DataSourceManager {
    fn drop(&mut self) {
        let pools = self.take_pools();
        if pools.is_empty() {
            return;
        }

        warn!(
            count = pools.len(),
            "data source manager dropped without being closed"
        );
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    for data_source in pools {
                        data_source.close().await;
                    }
                });
            }
            Err(_) => warn!("no runtime available, pools are released without closing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MEMORY;
    use crate::engine::memory::{MemoryDataSourceFactory, MemoryDatabase};
    use crate::error::ErrorKind;

    fn memory_config(url: &str) -> DataSourceConfig {
        DataSourceConfig::new(MEMORY, url)
    }

    fn task_config(source: &str, target: &str) -> TaskConfig {
        TaskConfig::new(
            2,
            source,
            memory_config(source),
            memory_config(target),
            BTreeMap::new(),
        )
    }

    fn factories(databases: &[(&str, &MemoryDatabase)]) -> Arc<DataSourceFactories> {
        let factory = databases
            .iter()
            .fold(MemoryDataSourceFactory::new(), |factory, (url, database)| {
                factory.with_database(*url, (*database).clone())
            });

        let mut factories = DataSourceFactories::new();
        factories.register(MEMORY, Arc::new(factory));
        Arc::new(factories)
    }

    #[tokio::test]
    async fn shares_pools_between_task_configs() {
        let source = MemoryDatabase::builder().build();
        let target = MemoryDatabase::builder().build();
        let factories = factories(&[("memory://ds_0", &source), ("memory://target", &target)]);

        let manager = DataSourceManager::new(
            factories,
            &[
                task_config("memory://ds_0", "memory://target"),
                task_config("memory://ds_0", "memory://target"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(manager.cached_data_sources().len(), 2);
        assert_eq!(manager.source_data_sources().len(), 1);
        assert_eq!(manager.target_data_sources().len(), 1);
        assert_eq!(source.opened_count(), 1);
        assert_eq!(target.opened_count(), 1);
        manager.close().await;
    }

    #[tokio::test]
    async fn closes_every_pool_once_when_closed() {
        let source = MemoryDatabase::builder().build();
        let target = MemoryDatabase::builder().build();
        let factories = factories(&[("memory://ds_0", &source), ("memory://target", &target)]);

        let manager = DataSourceManager::new(
            factories,
            &[task_config("memory://ds_0", "memory://target")],
        )
        .await
        .unwrap();
        manager.close().await;

        assert_eq!(source.close_count(), 1);
        assert_eq!(target.close_count(), 1);
    }

    #[tokio::test]
    async fn closes_opened_pools_when_construction_fails() {
        let source = MemoryDatabase::builder().build();
        let factories = factories(&[("memory://ds_0", &source)]);

        let err = DataSourceManager::new(
            factories,
            &[task_config("memory://ds_0", "memory://unknown")],
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(source.opened_count(), 1);
        assert_eq!(source.close_count(), 1);
    }

    #[tokio::test]
    async fn rejects_unregistered_database_types() {
        let mut config = task_config("memory://ds_0", "memory://target");
        config.dumper_config.data_source.database_type = "Oracle".to_owned();

        let err = DataSourceManager::new(Arc::new(DataSourceFactories::new()), &[config])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedDatabaseType);
    }

    #[tokio::test]
    async fn closes_pools_in_background_when_dropped() {
        let source = MemoryDatabase::builder().build();
        let target = MemoryDatabase::builder().build();
        let factories = factories(&[("memory://ds_0", &source), ("memory://target", &target)]);

        let manager = DataSourceManager::new(
            factories,
            &[task_config("memory://ds_0", "memory://target")],
        )
        .await
        .unwrap();
        drop(manager);
        tokio::task::yield_now().await;

        assert_eq!(source.close_count(), 1);
        assert_eq!(target.close_count(), 1);
    }
}
