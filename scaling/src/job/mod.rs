pub mod checker;
pub mod position;
pub mod preparer;
pub mod splitter;
pub mod task;

pub use preparer::ScalingJobPreparer;
