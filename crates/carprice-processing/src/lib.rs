//! Used-Car Price Feature Pipeline
//!
//! Turns raw vehicle listings into the numeric feature vectors a price
//! regressor was fit on, built with Rust and Polars.
//!
//! # Overview
//!
//! The pipeline runs in two modes:
//!
//! - **Training**: a whole dataset is deduplicated, normalized, filtered for
//!   IQR outliers, given an `Age` column and used to fit the encoders
//! - **Inference**: one record is validated, normalized, engineered and
//!   encoded against previously fitted artifacts, then scored by a model
//!
//! Both modes apply the same field rules, so a record encoded at serving time
//! lands in exactly the feature space the model saw during training.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use carprice_processing::{FittedArtifacts, Pipeline, PipelineConfig, RawRecord};
//! use polars::prelude::*;
//!
//! // Training: fit encoders on a dataset
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("car_price_prediction.csv".into()))?
//!     .finish()?;
//!
//! let output = Pipeline::builder()
//!     .config(PipelineConfig::builder().reference_year(2025).build()?)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run_training(df)?;
//! output.encoders.save("artifacts")?;
//!
//! // Inference: score a single request
//! let artifacts = FittedArtifacts::load("artifacts")?;
//! let record: RawRecord = serde_json::from_str(body)?;
//! let price = Pipeline::builder().build()?.predict(&record, &artifacts)?;
//! ```
//!
//! # Artifacts
//!
//! Fitted encoders and the model are plain JSON files; see [`artifacts`] for
//! the directory layout. Any regressor can be plugged in by implementing
//! [`PriceModel`].
//!
//! # Errors
//!
//! Every failure is a [`PipelineError`] scoped to the record that caused it.
//! Batch helpers such as [`Pipeline::predict_batch`] return one result per
//! record, so a bad row never poisons its neighbours.

pub mod artifacts;
pub mod cleaner;
pub mod config;
pub mod encoding;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use artifacts::FittedArtifacts;
pub use cleaner::{DataCleaner, FieldNormalizer, read_listings_csv};
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use encoding::{
    EncodingArtifacts, HandleUnknown, LabelEncoder, OneHotEncoder, StandardScaler,
};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use model::{LinearPriceModel, PriceModel};
pub use pipeline::{
    ClosureProgressReporter, FeatureEngineer, OutlierFilter, OutlierReport, Pipeline,
    PipelineBuilder, PipelineStage, ProgressReporter, ProgressUpdate, TrainingOutput,
    TrainingSummary,
};
pub use types::{CleanedRecord, EngineeredRecord, FeatureVector, FieldValue, RawRecord};
pub use utils::{clean_numeric_string, parse_numeric_text};
