pub mod processor;
pub mod writer;

pub use processor::BatchProcessor;
pub use writer::BulkWriteExecutor;
