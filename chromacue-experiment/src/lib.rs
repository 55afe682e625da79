pub mod config;
pub mod error;
pub mod runner;
pub mod schedule;
pub mod writer;

pub use config::ExperimentConfig;
pub use error::RunError;
pub use runner::{RunContext, RunnerAction, TrialRunner};
pub use writer::ResultWriter;
