//! In-process engine.
//!
//! A [`MemoryDatabase`] stands in for a datastore: it holds table shapes and primary key
//! values, and exposes switches for the conditions the checkers look at. Clones share the
//! same state, so tests keep a handle to inspect how preparation used the database.

use async_trait::async_trait;
use scaling_config::shared::DataSourceConfig;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::bail;
use crate::datasource::{
    ColumnMetadata, DataSource, DataSourceFactory, DataType, TableMetadata, downcast_data_source,
};
use crate::error::{ErrorKind, ScalingResult};
use crate::job::checker::DataSourceChecker;
use crate::job::position::PositionInitializer;
use crate::types::{JobId, Position};

/// Shape and primary key values of an in-memory table.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    columns: Vec<ColumnMetadata>,
    primary_keys: Vec<String>,
    keys: BTreeSet<i64>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
            keys: BTreeSet::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(ColumnMetadata {
            name: name.into(),
            data_type,
        });
        self
    }

    /// Adds a column that is part of the primary key.
    pub fn primary_key(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        self.primary_keys.push(name.clone());
        self.column(name, data_type)
    }

    /// Adds rows identified by their integer primary key value.
    pub fn rows(mut self, keys: impl IntoIterator<Item = i64>) -> Self {
        self.keys.extend(keys);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> TableMetadata {
        TableMetadata {
            name: self.name.clone(),
            columns: self.columns.clone(),
            primary_keys: self.primary_keys.clone(),
        }
    }
}

#[derive(Debug)]
struct State {
    tables: BTreeMap<String, MemoryTable>,
    reachable: bool,
    can_read: bool,
    can_replicate: bool,
    change_capture_enabled: bool,
    failing_queries: bool,
    position: Option<Position>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            tables: BTreeMap::new(),
            reachable: true,
            can_read: true,
            can_replicate: true,
            change_capture_enabled: true,
            failing_queries: false,
            position: Some(Position::new("0")),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    position_captures: AtomicUsize,
}

/// An in-process datastore shared by every pool opened on it.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

impl MemoryDatabase {
    pub fn builder() -> MemoryDatabaseBuilder {
        MemoryDatabaseBuilder::default()
    }

    pub async fn set_reachable(&self, reachable: bool) {
        self.shared.state.lock().await.reachable = reachable;
    }

    pub async fn set_privileges(&self, can_read: bool, can_replicate: bool) {
        let mut state = self.shared.state.lock().await;
        state.can_read = can_read;
        state.can_replicate = can_replicate;
    }

    pub async fn set_change_capture_enabled(&self, enabled: bool) {
        self.shared.state.lock().await.change_capture_enabled = enabled;
    }

    /// Makes every metadata query and position capture fail with a query error.
    pub async fn set_failing_queries(&self, failing: bool) {
        self.shared.state.lock().await.failing_queries = failing;
    }

    pub async fn set_position(&self, position: Option<Position>) {
        self.shared.state.lock().await.position = position;
    }

    pub async fn insert_table(&self, table: MemoryTable) {
        let mut state = self.shared.state.lock().await;
        state.tables.insert(table.name.clone(), table);
    }

    /// Number of pools opened on this database.
    pub fn opened_count(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Number of pools closed on this database.
    pub fn close_count(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Number of checkpoints captured from this database.
    pub fn position_capture_count(&self) -> usize {
        self.shared.position_captures.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct MemoryDatabaseBuilder {
    state: State,
}

impl MemoryDatabaseBuilder {
    pub fn table(mut self, table: MemoryTable) -> Self {
        self.state.tables.insert(table.name.clone(), table);
        self
    }

    pub fn reachable(mut self, reachable: bool) -> Self {
        self.state.reachable = reachable;
        self
    }

    pub fn privileges(mut self, can_read: bool, can_replicate: bool) -> Self {
        self.state.can_read = can_read;
        self.state.can_replicate = can_replicate;
        self
    }

    pub fn change_capture_enabled(mut self, enabled: bool) -> Self {
        self.state.change_capture_enabled = enabled;
        self
    }

    pub fn position(mut self, position: Position) -> Self {
        self.state.position = Some(position);
        self
    }

    pub fn build(self) -> MemoryDatabase {
        MemoryDatabase {
            shared: Arc::new(Shared {
                state: Mutex::new(self.state),
                ..Shared::default()
            }),
        }
    }
}

/// A pool on a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryDataSource {
    config: DataSourceConfig,
    database: MemoryDatabase,
}

impl MemoryDataSource {
    pub fn database(&self) -> &MemoryDatabase {
        &self.database
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    async fn ping(&self) -> ScalingResult<()> {
        let state = self.database.shared.state.lock().await;
        if !state.reachable {
            bail!(
                ErrorKind::ConnectionFailed,
                "Memory database is unreachable",
                self.config.url.clone()
            );
        }

        Ok(())
    }

    async fn table_metadata(&self, table_name: &str) -> ScalingResult<Option<TableMetadata>> {
        let state = self.database.shared.state.lock().await;
        check_queryable(&state)?;

        Ok(state.tables.get(table_name).map(MemoryTable::metadata))
    }

    async fn primary_key_range(
        &self,
        table_name: &str,
        column_name: &str,
    ) -> ScalingResult<Option<(i64, i64)>> {
        let state = self.database.shared.state.lock().await;
        check_queryable(&state)?;

        let Some(table) = state.tables.get(table_name) else {
            bail!(
                ErrorKind::QueryFailed,
                "Table does not exist",
                format!("table '{table_name}' does not exist")
            );
        };
        if !table.primary_keys.iter().any(|key| key == column_name) {
            bail!(
                ErrorKind::InvalidData,
                "Column is not a primary key column",
                format!("column '{column_name}' is not a primary key of '{table_name}'")
            );
        }

        Ok(table.keys.first().zip(table.keys.last()).map(|(min, max)| (*min, *max)))
    }

    async fn close(&self) {
        self.database.shared.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn check_queryable(state: &State) -> ScalingResult<()> {
    if !state.reachable {
        bail!(ErrorKind::ConnectionFailed, "Memory database is unreachable");
    }
    if state.failing_queries {
        bail!(ErrorKind::QueryFailed, "Memory database query failed");
    }

    Ok(())
}

/// Opens [`MemoryDataSource`]s on the databases registered by url.
#[derive(Debug, Default)]
pub struct MemoryDataSourceFactory {
    databases: HashMap<String, MemoryDatabase>,
}

impl MemoryDataSourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `database` reachable under `url`.
    pub fn with_database(mut self, url: impl Into<String>, database: MemoryDatabase) -> Self {
        self.databases.insert(url.into(), database);
        self
    }
}

impl DataSourceFactory for MemoryDataSourceFactory {
    fn create(&self, config: &DataSourceConfig) -> ScalingResult<Arc<dyn DataSource>> {
        let Some(database) = self.databases.get(&config.url) else {
            bail!(
                ErrorKind::InvalidConfiguration,
                "No memory database registered for url",
                config.url.clone()
            );
        };
        database.shared.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(MemoryDataSource {
            config: config.clone(),
            database: database.clone(),
        }))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryChecker;

#[async_trait]
impl DataSourceChecker for MemoryChecker {
    async fn check_privilege(&self, data_sources: &[Arc<dyn DataSource>]) -> ScalingResult<()> {
        for data_source in data_sources {
            let data_source = downcast_data_source::<MemoryDataSource>(data_source.as_ref())?;
            let state = data_source.database.shared.state.lock().await;
            if !state.can_read {
                bail!(
                    ErrorKind::InsufficientPrivilege,
                    "Source tables are not readable",
                    data_source.config.url.clone()
                );
            }
            if !state.can_replicate {
                bail!(
                    ErrorKind::InsufficientPrivilege,
                    "Source changes cannot be captured",
                    data_source.config.url.clone()
                );
            }
        }

        Ok(())
    }

    async fn check_variable(&self, data_sources: &[Arc<dyn DataSource>]) -> ScalingResult<()> {
        for data_source in data_sources {
            let data_source = downcast_data_source::<MemoryDataSource>(data_source.as_ref())?;
            let state = data_source.database.shared.state.lock().await;
            if !state.change_capture_enabled {
                bail!(
                    ErrorKind::IncompatibleConfiguration,
                    "Change capture is disabled on source",
                    data_source.config.url.clone()
                );
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryPositionInitializer;

#[async_trait]
impl PositionInitializer for MemoryPositionInitializer {
    async fn init(
        &self,
        _job_id: JobId,
        data_source: &dyn DataSource,
    ) -> ScalingResult<Position> {
        let data_source = downcast_data_source::<MemoryDataSource>(data_source)?;
        let state = data_source.database.shared.state.lock().await;
        check_queryable(&state)?;

        let Some(position) = state.position.clone() else {
            bail!(
                ErrorKind::PositionCaptureFailed,
                "Memory database has no current position",
                data_source.config.url.clone()
            );
        };
        data_source
            .database
            .shared
            .position_captures
            .fetch_add(1, Ordering::SeqCst);

        Ok(position)
    }
}
