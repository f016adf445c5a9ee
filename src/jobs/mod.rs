//! Job processing module.

mod pipeline;
mod pool;
mod processor;
mod scheduler;
mod summary;

pub use pipeline::PipelineBuilder;
pub use pool::{WorkerPermit, WorkerPool};
pub use processor::ChunkProcessor;
pub use scheduler::{FileScheduler, WorkItem};
pub use summary::{RunSummary, LOW_CLEANING_PERCENTAGE, SUMMARY_FILE_NAME};
