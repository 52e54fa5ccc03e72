//! Built-in engines and the registries preparation dispatches through.
//!
//! Each engine contributes a [`crate::datasource::DataSourceFactory`], a
//! [`crate::job::checker::DataSourceChecker`] and a
//! [`crate::job::position::PositionInitializer`], registered under its database type.

pub mod memory;
pub mod postgres;
mod registry;

use std::sync::Arc;

use crate::datasource::DataSourceFactories;
use crate::job::checker::CheckerRegistry;
use crate::job::position::PositionInitializerRegistry;

pub use registry::*;

/// Database type of the PostgreSQL engine.
pub const POSTGRESQL: &str = "PostgreSQL";
/// Database type of the in-process engine.
pub const MEMORY: &str = "Memory";

impl DataSourceFactories {
    /// Factories of the built-in engines.
    ///
    /// The memory factory starts without databases, register a populated
    /// [`memory::MemoryDataSourceFactory`] under [`MEMORY`] to use it.
    pub fn with_defaults() -> Self {
        Self::new()
            .with(POSTGRESQL, Arc::new(postgres::PgDataSourceFactory))
            .with(MEMORY, Arc::new(memory::MemoryDataSourceFactory::new()))
    }
}

impl CheckerRegistry {
    pub fn with_defaults() -> Self {
        Self::new()
            .with(POSTGRESQL, Arc::new(postgres::PgDataSourceChecker))
            .with(MEMORY, Arc::new(memory::MemoryChecker))
    }
}

impl PositionInitializerRegistry {
    pub fn with_defaults() -> Self {
        Self::new()
            .with(POSTGRESQL, Arc::new(postgres::PgPositionInitializer))
            .with(MEMORY, Arc::new(memory::MemoryPositionInitializer))
    }
}
