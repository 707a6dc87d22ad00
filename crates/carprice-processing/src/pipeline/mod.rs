//! Pipeline module.
//!
//! This module provides the price pipeline and the stages it sequences.

mod builder;
pub mod features;
pub mod outliers;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder, TrainingOutput, TrainingSummary};
pub use features::{FeatureEngineer, engineered_records};
pub use outliers::{ColumnFilterReport, OutlierFilter, OutlierReport};
pub use progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
