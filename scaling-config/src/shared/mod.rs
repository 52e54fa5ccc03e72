mod base;
mod data_source;
mod scaling;

pub use base::*;
pub use data_source::*;
pub use scaling::*;
