pub mod pipeline_commands;

pub use pipeline_commands::{run_analysis, run_analysis_at, run_with_detectors};
