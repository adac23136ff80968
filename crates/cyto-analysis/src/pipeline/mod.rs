//! Pipeline module.
//!
//! This module provides the filter pipeline composer and its progress
//! reporting types.

mod builder;
pub mod progress;
mod step;

pub use builder::{Pipeline, PipelineBuilder, PipelineRun, StepRecord};
pub use progress::{AnalysisStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate};
pub use step::{FilterStep, default_steps};
