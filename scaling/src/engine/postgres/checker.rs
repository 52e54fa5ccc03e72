use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::bail;
use crate::datasource::DataSource;
use crate::engine::postgres::PgDataSource;
use crate::error::{ErrorKind, ScalingResult};
use crate::job::checker::DataSourceChecker;

/// `wal_level` required to decode changes through a logical replication slot.
const REQUIRED_WAL_LEVEL: &str = "logical";

/// Checks Postgres sources for the privileges and settings logical decoding needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDataSourceChecker;

#[async_trait]
impl DataSourceChecker for PgDataSourceChecker {
    async fn check_privilege(&self, data_sources: &[Arc<dyn DataSource>]) -> ScalingResult<()> {
        for data_source in data_sources {
            let pool = PgDataSource::downcast(data_source.as_ref())?.pool();

            let (is_superuser, can_replicate): (bool, bool) = sqlx::query_as(
                "select rolsuper, rolreplication from pg_roles where rolname = current_user",
            )
            .fetch_one(pool)
            .await?;
            if !is_superuser && !can_replicate {
                bail!(
                    ErrorKind::InsufficientPrivilege,
                    "Source role can not create replication slots",
                    "the role needs the superuser or the replication attribute"
                );
            }

            let unreadable: Vec<String> = sqlx::query_scalar(
                r#"
                select format('%I.%I', schemaname, tablename)
                from pg_tables
                where schemaname = 'public'
                  and not has_table_privilege(format('%I.%I', schemaname, tablename), 'select')
                order by 1
                "#,
            )
            .fetch_all(pool)
            .await?;
            if !unreadable.is_empty() {
                bail!(
                    ErrorKind::InsufficientPrivilege,
                    "Source role can not read every table",
                    format!("missing select privilege on {}", unreadable.join(", "))
                );
            }

            debug!(is_superuser, can_replicate, "source role privileges are sufficient");
        }

        Ok(())
    }

    async fn check_variable(&self, data_sources: &[Arc<dyn DataSource>]) -> ScalingResult<()> {
        for data_source in data_sources {
            let pool = PgDataSource::downcast(data_source.as_ref())?.pool();

            let wal_level: String = sqlx::query_scalar("select current_setting('wal_level')")
                .fetch_one(pool)
                .await?;
            if wal_level != REQUIRED_WAL_LEVEL {
                bail!(
                    ErrorKind::IncompatibleConfiguration,
                    "Source does not support logical decoding",
                    format!("wal_level is '{wal_level}', expected '{REQUIRED_WAL_LEVEL}'")
                );
            }

            let max_replication_slots: i32 =
                sqlx::query_scalar("select current_setting('max_replication_slots')::int4")
                    .fetch_one(pool)
                    .await?;
            if max_replication_slots <= 0 {
                bail!(
                    ErrorKind::IncompatibleConfiguration,
                    "Source does not allow replication slots",
                    "max_replication_slots is 0"
                );
            }
        }

        Ok(())
    }
}
