//! Configuration management for scaling jobs.
//!
//! Provides environment detection, layered configuration loading from YAML files and
//! environment variables, secret handling, and the shared configuration types used to
//! describe data sources and scaling jobs.

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::*;
pub use load::*;
pub use secret::*;
