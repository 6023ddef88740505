pub mod artifacts;
pub mod config;
pub mod domain;
pub mod pipeline;
pub mod stages;
pub mod tools;

pub use config::RunConfiguration;
pub use domain::{ConfgenError, ConfgenErrorCategory, ConfgenResult};
pub use pipeline::{PipelineReport, run_pipeline};
