//! Preparation of online data migration ("scaling") jobs.
//!
//! [`job::ScalingJobPreparer`] validates the source and target data sources of a
//! [`types::ScalingJob`], fixes a replication checkpoint per source and plans the inventory
//! and incremental tasks an executor runs afterwards. Engines plug in through the
//! registries in [`engine`].

pub mod config;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod job;
mod macros;
pub mod types;
