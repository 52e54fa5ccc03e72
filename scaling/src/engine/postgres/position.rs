use async_trait::async_trait;
use tokio_postgres::types::PgLsn;
use tracing::info;

use crate::datasource::DataSource;
use crate::engine::postgres::PgDataSource;
use crate::error::{ErrorKind, ScalingError, ScalingResult};
use crate::job::position::PositionInitializer;
use crate::scaling_error;
use crate::types::{JobId, Position};

/// Prefix of the logical replication slots that retain the WAL of a migration.
pub const SLOT_NAME_PREFIX: &str = "scaling_migration";

/// Output plugin of the migration slots.
pub const DECODING_PLUGIN: &str = "test_decoding";

/// Returns the replication slot owned by `job_id`.
pub fn slot_name(job_id: JobId) -> String {
    format!("{SLOT_NAME_PREFIX}_{job_id}")
}

/// Captures the current WAL location of a Postgres source as its fence point.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgPositionInitializer;

#[async_trait]
impl PositionInitializer for PgPositionInitializer {
    async fn init(
        &self,
        job_id: JobId,
        data_source: &dyn DataSource,
    ) -> ScalingResult<Position> {
        let pool = PgDataSource::downcast(data_source)?.pool();
        let slot_name = slot_name(job_id);

        // The slot must exist before the location is read, otherwise WAL between the two
        // could be recycled.
        let mut transaction = pool.begin().await?;
        sqlx::query("set transaction isolation level repeatable read")
            .execute(&mut *transaction)
            .await?;

        let slot_exists: bool = sqlx::query_scalar(
            "select exists (select 1 from pg_replication_slots where slot_name = $1)",
        )
        .bind(&slot_name)
        .fetch_one(&mut *transaction)
        .await?;
        if !slot_exists {
            sqlx::query("select pg_create_logical_replication_slot($1, $2)")
                .bind(&slot_name)
                .bind(DECODING_PLUGIN)
                .execute(&mut *transaction)
                .await
                .map_err(|err| {
                    ScalingError::from(err).with_kind(
                        ErrorKind::PositionCaptureFailed,
                        "Could not create the replication slot",
                    )
                })?;
            info!(%slot_name, "created replication slot");
        }

        let lsn: String = sqlx::query_scalar("select pg_current_wal_lsn()::text")
            .fetch_one(&mut *transaction)
            .await?;
        transaction.commit().await?;

        let lsn = lsn.parse::<PgLsn>().map_err(|_| {
            scaling_error!(
                ErrorKind::PositionCaptureFailed,
                "Source returned a malformed WAL location",
                lsn
            )
        })?;

        Ok(Position::from(lsn))
    }
}
