use thiserror::Error;

/// Errors raised while validating configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A job must describe at least one source to target data flow.
    #[error("at least one task must be configured")]
    NoTasks,

    /// Concurrency must be strictly positive.
    #[error("`concurrency` cannot be zero")]
    ConcurrencyZero,

    /// A data source descriptor is incomplete.
    #[error("invalid data source `{name}`: {reason}")]
    InvalidDataSource { name: String, reason: String },

    /// Two tasks read from the same logical source name.
    #[error("duplicate source data source name `{0}`")]
    DuplicateSourceName(String),

    /// A task does not name any table to migrate.
    #[error("task for source `{0}` has no sharding tables")]
    NoShardingTables(String),
}
