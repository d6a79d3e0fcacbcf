pub mod processor;

pub use processor::{BatchFailure, BatchOutcome, BatchProcessor, BatchStep};
