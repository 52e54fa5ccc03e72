mod job;
mod position;

pub use job::*;
pub use position::*;
