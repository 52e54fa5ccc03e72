use async_trait::async_trait;
use scaling::config::TaskConfig;
use scaling::datasource::{DataSource, DataSourceFactories, DataType};
use scaling::engine::memory::{
    MemoryChecker, MemoryDataSourceFactory, MemoryDatabase, MemoryPositionInitializer,
    MemoryTable,
};
use scaling::error::ScalingResult;
use scaling::job::ScalingJobPreparer;
use scaling::job::checker::CheckerRegistry;
use scaling::job::position::{PositionInitializer, PositionInitializerRegistry};
use scaling::types::{JobId, Position, ScalingJob};
use scaling_config::shared::DataSourceConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub const SOURCE_URL: &str = "memory://ds_0";
pub const TARGET_URL: &str = "memory://target";

/// An `orders` table keyed by `order_id` holding the given keys.
pub fn orders_table(keys: impl IntoIterator<Item = i64>) -> MemoryTable {
    MemoryTable::new("orders")
        .primary_key("order_id", DataType::BigInt)
        .column("user_id", DataType::Integer)
        .column("status", DataType::Other("text".to_owned()))
        .rows(keys)
}

pub fn sharding_columns(entries: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
    entries
        .iter()
        .map(|(table, columns)| {
            (
                table.to_string(),
                columns.iter().map(|column| column.to_string()).collect(),
            )
        })
        .collect()
}

pub fn task_config(
    database_type: &str,
    concurrency: usize,
    source_name: &str,
    source_url: &str,
    sharding_columns: BTreeMap<String, BTreeSet<String>>,
) -> TaskConfig {
    TaskConfig::new(
        concurrency,
        source_name,
        DataSourceConfig::new(database_type, source_url),
        DataSourceConfig::new(database_type, TARGET_URL),
        sharding_columns,
    )
}

pub fn job(database_type: &str, task_configs: Vec<TaskConfig>) -> ScalingJob {
    ScalingJob::new(1, database_type, task_configs)
}

/// Hands out a fixed position and records the jobs it was asked for one by.
#[derive(Debug)]
pub struct FixedPositionInitializer {
    position: Position,
    calls: AtomicUsize,
    job_ids: Mutex<Vec<JobId>>,
}

impl FixedPositionInitializer {
    pub fn new(position: &str) -> Self {
        Self {
            position: Position::new(position),
            calls: AtomicUsize::new(0),
            job_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.job_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl PositionInitializer for FixedPositionInitializer {
    async fn init(
        &self,
        job_id: JobId,
        _data_source: &dyn DataSource,
    ) -> ScalingResult<Position> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.job_ids.lock().unwrap().push(job_id);

        Ok(self.position.clone())
    }
}

/// An event seen by [`CapturedEvents`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub job_id: Option<JobId>,
}

/// Layer keeping the level and `job_id` field of every event.
#[derive(Debug, Clone, Default)]
pub struct CapturedEvents {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedEvents {
    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.level == level)
            .cloned()
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = JobIdVisitor::default();
        event.record(&mut visitor);

        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            job_id: visitor.job_id,
        });
    }
}

#[derive(Default)]
struct JobIdVisitor {
    job_id: Option<JobId>,
}

impl Visit for JobIdVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "job_id" {
            self.job_id = Some(value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "job_id" {
            self.job_id = JobId::try_from(value).ok();
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

/// Memory databases wired into a preparer under a single database type.
pub struct TestEngine {
    database_type: String,
    databases: Vec<(String, MemoryDatabase)>,
    position_initializer: Option<Arc<dyn PositionInitializer>>,
}

impl TestEngine {
    pub fn new(database_type: &str) -> Self {
        Self {
            database_type: database_type.to_owned(),
            databases: Vec::new(),
            position_initializer: None,
        }
    }

    pub fn with_database(mut self, url: &str, database: &MemoryDatabase) -> Self {
        self.databases.push((url.to_owned(), database.clone()));
        self
    }

    pub fn with_position_initializer(
        mut self,
        position_initializer: Arc<dyn PositionInitializer>,
    ) -> Self {
        self.position_initializer = Some(position_initializer);
        self
    }

    pub fn preparer(self) -> ScalingJobPreparer {
        let factory = self
            .databases
            .into_iter()
            .fold(MemoryDataSourceFactory::new(), |factory, (url, database)| {
                factory.with_database(url, database)
            });
        let position_initializer = self
            .position_initializer
            .unwrap_or_else(|| Arc::new(MemoryPositionInitializer));

        ScalingJobPreparer::new(
            DataSourceFactories::new().with(&self.database_type, Arc::new(factory)),
            CheckerRegistry::new().with(&self.database_type, Arc::new(MemoryChecker)),
            PositionInitializerRegistry::new().with(&self.database_type, position_initializer),
        )
    }
}
