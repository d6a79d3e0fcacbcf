pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod errors;
pub mod logging;
pub mod orchestrator;
pub mod progress;
pub mod runner;
pub mod settings;
pub mod track;
pub mod validate;

#[cfg(test)]
pub mod testing;
