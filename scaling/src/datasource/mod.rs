mod base;
mod manager;

pub use base::*;
pub use manager::*;
