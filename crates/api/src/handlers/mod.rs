pub mod fleet;
pub mod jobs;
