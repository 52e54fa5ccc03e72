use async_trait::async_trait;
use scaling_config::shared::DataSourceConfig;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::engine::DatabaseTypeRegistry;
use crate::error::{ErrorKind, ScalingResult};
use crate::scaling_error;

/// Column type as far as preparation cares about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    SmallInt,
    Integer,
    BigInt,
    Other(String),
}

impl DataType {
    /// Maps a Postgres type name, as printed by `format_type`, to a [`DataType`].
    pub fn from_pg_type_name(name: &str) -> Self {
        match name {
            "smallint" | "int2" => DataType::SmallInt,
            "integer" | "int" | "int4" => DataType::Integer,
            "bigint" | "int8" => DataType::BigInt,
            other => DataType::Other(other.to_owned()),
        }
    }

    /// Returns `true` for types whose values can be split into key ranges.
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::SmallInt | DataType::Integer | DataType::BigInt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: DataType,
}

/// Shape of a table on a data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
    /// Primary key columns in key order.
    pub primary_keys: Vec<String>,
}

impl TableMetadata {
    /// Looks a column up by name. Identifiers are compared case-insensitively.
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns the primary key column if the key is a single integer column.
    pub fn single_integer_primary_key(&self) -> Option<&ColumnMetadata> {
        match self.primary_keys.as_slice() {
            [primary_key] => self
                .column(primary_key)
                .filter(|column| column.data_type.is_integer()),
            _ => None,
        }
    }
}

/// A pooled connection to one source or target datastore.
///
/// Implementations are engine specific. The engine agnostic parts of preparation only use
/// the methods below, engine specific checkers and position initializers recover their
/// concrete type with [`downcast_data_source`].
#[async_trait]
pub trait DataSource: fmt::Debug + Send + Sync {
    fn config(&self) -> &DataSourceConfig;

    /// Runs a liveness probe against the datastore.
    async fn ping(&self) -> ScalingResult<()>;

    /// Returns the metadata of `table_name`, or `None` if the table does not exist.
    async fn table_metadata(&self, table_name: &str) -> ScalingResult<Option<TableMetadata>>;

    /// Returns the smallest and largest value of an integer column, or `None` if the table
    /// is empty.
    async fn primary_key_range(
        &self,
        table_name: &str,
        column_name: &str,
    ) -> ScalingResult<Option<(i64, i64)>>;

    /// Releases the pool and waits until its connections are closed. Called exactly once by
    /// the owning [`crate::datasource::DataSourceManager`].
    async fn close(&self);

    fn as_any(&self) -> &dyn Any;
}

/// Opens pools for one engine.
pub trait DataSourceFactory: fmt::Debug + Send + Sync {
    fn create(&self, config: &DataSourceConfig) -> ScalingResult<Arc<dyn DataSource>>;
}

/// Data source factories keyed by database type.
pub type DataSourceFactories = DatabaseTypeRegistry<dyn DataSourceFactory>;

/// Recovers the concrete data source type an engine component works with.
pub fn downcast_data_source<T>(data_source: &dyn DataSource) -> ScalingResult<&T>
where
    T: DataSource + 'static,
{
    data_source.as_any().downcast_ref::<T>().ok_or_else(|| {
        scaling_error!(
            ErrorKind::UnsupportedDatabaseType,
            "Data source belongs to a different engine",
            format!(
                "expected a {} data source, got a '{}' one",
                std::any::type_name::<T>(),
                data_source.config().database_type
            )
        )
    })
}
