//! PostgreSQL engine built on `sqlx` pools.

mod checker;
mod data_source;
mod position;

pub use checker::*;
pub use data_source::*;
pub use position::*;
