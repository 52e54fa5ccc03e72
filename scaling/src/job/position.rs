use async_trait::async_trait;

use crate::datasource::DataSource;
use crate::engine::DatabaseTypeRegistry;
use crate::error::ScalingResult;
use crate::types::{JobId, Position};

/// Position initializers keyed by database type.
pub type PositionInitializerRegistry = DatabaseTypeRegistry<dyn PositionInitializer>;

/// Captures the fence point of a source.
///
/// Everything committed before the returned [`Position`] is copied by inventory tasks and
/// everything after it is applied by the incremental task. Implementations must make the
/// point durable (for example by creating a replication slot) and read it in one atomic
/// step, so that no change falls between the two. Anything made durable belongs to
/// `job_id` alone, so jobs prepared concurrently against one server stay apart.
#[async_trait]
pub trait PositionInitializer: Send + Sync {
    async fn init(
        &self,
        job_id: JobId,
        data_source: &dyn DataSource,
    ) -> ScalingResult<Position>;
}
