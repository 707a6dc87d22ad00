//! Pipeline stages and progress reporting.
//!
//! # Example
//!
//! ```rust,ignore
//! use carprice_processing::Pipeline;
//!
//! let output = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run_training(df)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the price pipeline.
///
/// Training mode walks `Deduplicate` through `Encode`; inference mode walks
/// `Validate`, `Normalize`, `EngineerFeatures`, `Encode` and `Predict`.
/// Errors raised inside a stage carry its [`display_name`](Self::display_name)
/// as context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Boundary checks on a raw record
    Validate,
    /// Removing exact duplicate rows
    Deduplicate,
    /// Coercing levy, engine volume and mileage to numbers
    Normalize,
    /// Removing IQR outliers
    FilterOutliers,
    /// Deriving `Age`
    EngineerFeatures,
    /// Dropping columns the model does not use
    DropColumns,
    /// Fitting encoders and scaler
    Fit,
    /// Producing feature vectors
    Encode,
    /// Running the model
    Predict,
    /// Pipeline completed successfully
    Complete,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Validate => "Validating Record",
            Self::Deduplicate => "Removing Duplicates",
            Self::Normalize => "Normalizing Fields",
            Self::FilterOutliers => "Filtering Outliers",
            Self::EngineerFeatures => "Engineering Features",
            Self::DropColumns => "Dropping Columns",
            Self::Fit => "Fitting Encoders",
            Self::Encode => "Encoding",
            Self::Predict => "Predicting",
            Self::Complete => "Complete",
        }
    }

    /// Cumulative training progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Validate | Self::Deduplicate => 0.0,
            Self::Normalize => 0.10,
            Self::FilterOutliers => 0.25,
            Self::EngineerFeatures => 0.40,
            Self::DropColumns => 0.50,
            Self::Fit => 0.55,
            Self::Encode => 0.70,
            Self::Predict => 0.95,
            Self::Complete => 1.0,
        }
    }
}

/// A stage transition reported during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,
    /// Overall progress (0.0 - 1.0)
    pub progress: f32,
    pub message: String,
    /// Rows in the frame when the stage started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: stage.base_progress(),
            message: message.into(),
            rows: None,
        }
    }

    pub fn with_rows(stage: PipelineStage, rows: usize) -> Self {
        Self {
            rows: Some(rows),
            ..Self::new(stage, format!("{} ({} rows)", stage.display_name(), rows))
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Complete, message)
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

/// Receives progress updates from a training run.
///
/// Implementations must be `Send + Sync` so a pipeline holding one can be
/// shared across threads.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_stage_progress_is_monotonic() {
        let stages = [
            PipelineStage::Deduplicate,
            PipelineStage::Normalize,
            PipelineStage::FilterOutliers,
            PipelineStage::EngineerFeatures,
            PipelineStage::DropColumns,
            PipelineStage::Fit,
            PipelineStage::Encode,
            PipelineStage::Complete,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].base_progress() < pair[1].base_progress());
        }
    }

    #[test]
    fn test_with_rows_message() {
        let update = ProgressUpdate::with_rows(PipelineStage::FilterOutliers, 42);
        assert_eq!(update.rows, Some(42));
        assert_eq!(update.message, "Filtering Outliers (42 rows)");
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ClosureProgressReporter::new(move |update: ProgressUpdate| {
            sink.lock().unwrap().push(update.stage);
        });

        reporter.report(ProgressUpdate::new(PipelineStage::Fit, "fitting"));
        reporter.report(ProgressUpdate::complete("done"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![PipelineStage::Fit, PipelineStage::Complete]
        );
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&PipelineStage::FilterOutliers).unwrap();
        assert_eq!(json, "\"filter_outliers\"");
    }
}
