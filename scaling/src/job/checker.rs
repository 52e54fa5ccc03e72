use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::bail;
use crate::datasource::DataSource;
use crate::engine::DatabaseTypeRegistry;
use crate::error::{ErrorKind, ScalingResult};

/// Checkers keyed by database type.
pub type CheckerRegistry = DatabaseTypeRegistry<dyn DataSourceChecker>;

/// Verifies that data sources can take part in a migration.
///
/// The preparer calls the checks in declaration order and stops at the first failure.
/// [`DataSourceChecker::check_connection`] and [`DataSourceChecker::check_target_table`]
/// only need the [`DataSource`] trait and have default implementations, the privilege and
/// variable checks are engine specific.
#[async_trait]
pub trait DataSourceChecker: Send + Sync {
    /// Fails with [`ErrorKind::DataSourceUnreachable`] if any data source does not answer.
    async fn check_connection(&self, data_sources: &[Arc<dyn DataSource>]) -> ScalingResult<()> {
        for data_source in data_sources {
            data_source.ping().await.map_err(|err| {
                err.with_kind(
                    ErrorKind::DataSourceUnreachable,
                    "Data source did not answer the connection check",
                )
            })?;
        }

        Ok(())
    }

    /// Fails with [`ErrorKind::InsufficientPrivilege`] if a source cannot be read or its
    /// changes cannot be captured.
    async fn check_privilege(&self, data_sources: &[Arc<dyn DataSource>]) -> ScalingResult<()>;

    /// Fails with [`ErrorKind::IncompatibleConfiguration`] if a source is not configured
    /// for change capture.
    async fn check_variable(&self, data_sources: &[Arc<dyn DataSource>]) -> ScalingResult<()>;

    /// Fails with [`ErrorKind::MissingTargetTable`] or [`ErrorKind::MissingTargetColumn`]
    /// if a target lacks a table or sharding column of `sharding_columns`.
    async fn check_target_table(
        &self,
        data_sources: &[Arc<dyn DataSource>],
        sharding_columns: &BTreeMap<String, BTreeSet<String>>,
    ) -> ScalingResult<()> {
        for data_source in data_sources {
            check_target_tables(data_source.as_ref(), sharding_columns).await?;
        }

        Ok(())
    }
}

async fn check_target_tables(
    data_source: &dyn DataSource,
    sharding_columns: &BTreeMap<String, BTreeSet<String>>,
) -> ScalingResult<()> {
    for (table_name, columns) in sharding_columns {
        let Some(metadata) = data_source.table_metadata(table_name).await? else {
            bail!(
                ErrorKind::MissingTargetTable,
                "Target table does not exist",
                format!("table '{table_name}' is missing on a target data source")
            );
        };

        if let Some(column) = columns.iter().find(|column| !metadata.has_column(column)) {
            bail!(
                ErrorKind::MissingTargetColumn,
                "Target table lacks a sharding column",
                format!("column '{column}' is missing from target table '{table_name}'")
            );
        }
    }

    Ok(())
}
