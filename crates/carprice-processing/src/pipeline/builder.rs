//! Main pipeline module.
//!
//! This module provides the `Pipeline` struct and builder for sequencing the
//! training (batch) and inference (single record) workflows.

use crate::artifacts::FittedArtifacts;
use crate::cleaner::{DataCleaner, FieldNormalizer};
use crate::config::{ConfigValidationError, PipelineConfig};
use crate::encoding::{EncodingArtifacts, rename_frame};
use crate::error::{Result, ResultExt};
use crate::pipeline::features::{FeatureEngineer, engineered_records};
use crate::pipeline::outliers::{OutlierFilter, OutlierReport};
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::types::{FeatureVector, RawRecord, columns};
use crate::utils::optional_f64;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Row counts and timings of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub rows_input: usize,
    pub duplicates_removed: usize,
    pub outliers: OutlierReport,
    pub rows_cleaned: usize,
    pub rows_encoded: usize,
    pub rows_rejected: usize,
    pub reference_year: i32,
    pub duration_ms: u64,
}

/// Result of [`Pipeline::run_training`].
#[derive(Debug, Clone)]
pub struct TrainingOutput {
    /// Deduplicated, normalized, filtered frame with `Age` and without the
    /// dropped columns.
    pub cleaned: DataFrame,
    /// The encoders that produced `features`: freshly fitted, or a copy of
    /// the ones passed to [`Pipeline::run_training_with`].
    pub encoders: EncodingArtifacts,
    /// One row per encoded record: the feature schema columns, followed by
    /// `Price` when the input had one.
    pub features: DataFrame,
    pub summary: TrainingSummary,
}

/// The price pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use carprice_processing::{FittedArtifacts, Pipeline, PipelineConfig};
///
/// // Training mode: fit encoders on a dataset
/// let output = Pipeline::builder()
///     .config(PipelineConfig::builder().reference_year(2025).build()?)
///     .build()?
///     .run_training(df)?;
///
/// // Inference mode: one record against loaded artifacts
/// let artifacts = FittedArtifacts::load("artifacts")?;
/// let price = Pipeline::builder().build()?.predict(&record, &artifacts)?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    outliers: OutlierFilter,
    engineer: FeatureEngineer,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Inference shares one pipeline across request threads
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The year `Age` is computed against. Without a pinned year this is
    /// read from the clock on every call.
    pub fn reference_year(&self) -> i32 {
        self.engineer.reference_year()
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn enter_stage(&self, stage: PipelineStage, rows: usize) {
        debug!("{} ({} rows)", stage.display_name(), rows);
        self.report_progress(ProgressUpdate::with_rows(stage, rows));
    }

    // =========================================================================
    // Inference mode
    // =========================================================================

    /// Validate, normalize, engineer and encode one record.
    ///
    /// Pure with respect to `artifacts`; safe to call concurrently.
    pub fn encode(&self, record: &RawRecord, artifacts: &FittedArtifacts) -> Result<FeatureVector> {
        record
            .validate(self.reference_year())
            .context(PipelineStage::Validate.display_name())?;

        let cleaned = FieldNormalizer::normalize_record(record);
        let engineered = self.engineer.engineer(cleaned);

        let features = artifacts
            .encoders()
            .transform(&engineered, artifacts.schema())
            .context(PipelineStage::Encode.display_name())?;
        debug!(
            "Encoded {} {} into {} features",
            record.manufacturer,
            record.model,
            features.len()
        );
        Ok(features)
    }

    /// Predict the price of one record.
    pub fn predict(&self, record: &RawRecord, artifacts: &FittedArtifacts) -> Result<f64> {
        let features = self.encode(record, artifacts)?;
        artifacts
            .model()
            .predict(&features)
            .context(PipelineStage::Predict.display_name())
    }

    /// Predict each record independently; one result per record.
    pub fn predict_batch(
        &self,
        records: &[RawRecord],
        artifacts: &FittedArtifacts,
    ) -> Vec<Result<f64>> {
        records
            .iter()
            .map(|record| self.predict(record, artifacts))
            .collect()
    }

    // =========================================================================
    // Training mode
    // =========================================================================

    /// Clean a training dataset and fit encoders on it.
    pub fn run_training(&self, df: DataFrame) -> Result<TrainingOutput> {
        self.train(df, None)
    }

    /// Clean a dataset and encode it with already fitted artifacts.
    ///
    /// Rows with categories the artifacts have never seen are skipped and
    /// counted in [`TrainingSummary::rows_rejected`].
    pub fn run_training_with(
        &self,
        df: DataFrame,
        artifacts: &FittedArtifacts,
    ) -> Result<TrainingOutput> {
        self.train(df, Some(artifacts))
    }

    fn train(&self, df: DataFrame, fitted: Option<&FittedArtifacts>) -> Result<TrainingOutput> {
        let start_time = Instant::now();
        info!("Starting training pipeline on {} rows...", df.height());

        let mut summary = TrainingSummary {
            rows_input: df.height(),
            reference_year: self.reference_year(),
            ..Default::default()
        };

        // Step 1: Deduplicate
        let df = if self.config.remove_duplicates {
            self.enter_stage(PipelineStage::Deduplicate, df.height());
            let (df, removed) = DataCleaner::remove_duplicates(df)
                .context(PipelineStage::Deduplicate.display_name())?;
            summary.duplicates_removed = removed;
            info!("Step 1: Removed {} duplicate rows", removed);
            df
        } else {
            info!("Step 1: Skipping duplicate removal (disabled)");
            df
        };

        // Step 2: Normalize
        self.enter_stage(PipelineStage::Normalize, df.height());
        let df = rename_frame(df)
            .and_then(FieldNormalizer::normalize_frame)
            .context(PipelineStage::Normalize.display_name())?;
        info!("Step 2: Normalized levy, engine volume and mileage");

        // Step 3: Filter outliers
        self.enter_stage(PipelineStage::FilterOutliers, df.height());
        let (df, report) = self
            .outliers
            .apply(df)
            .context(PipelineStage::FilterOutliers.display_name())?;
        info!(
            "Step 3: Removed {} outlier rows ({} remain)",
            report.rows_removed(),
            report.rows_after
        );
        summary.outliers = report;

        // Step 4: Engineer features
        self.enter_stage(PipelineStage::EngineerFeatures, df.height());
        let df = self
            .engineer
            .add_age(df)
            .context(PipelineStage::EngineerFeatures.display_name())?;
        info!("Step 4: Derived Age (reference year {})", self.reference_year());

        // Step 5: Drop unused columns
        self.enter_stage(PipelineStage::DropColumns, df.height());
        let cleaned = self.engineer.drop_unused(df);
        summary.rows_cleaned = cleaned.height();
        info!("Step 5: Cleaned frame has shape {:?}", cleaned.shape());

        // Step 6: Fit or reuse encoders
        let records =
            engineered_records(&cleaned).context(PipelineStage::Fit.display_name())?;
        let (encoders, schema) = match fitted {
            Some(artifacts) => {
                info!("Step 6: Using provided encoders");
                (artifacts.encoders().clone(), artifacts.schema().to_vec())
            }
            None => {
                self.enter_stage(PipelineStage::Fit, records.len());
                let encoders =
                    EncodingArtifacts::fit(&records, self.config.handle_unknown)
                        .context(PipelineStage::Fit.display_name())?;
                let schema = encoders.feature_names();
                info!("Step 6: Fitted encoders ({} features)", schema.len());
                (encoders, schema)
            }
        };

        // Step 7: Encode each row
        self.enter_stage(PipelineStage::Encode, records.len());
        let mut accepted: Vec<usize> = Vec::with_capacity(records.len());
        let mut vectors: Vec<FeatureVector> = Vec::with_capacity(records.len());
        for (idx, result) in encoders
            .transform_batch(&records, &schema)
            .into_iter()
            .enumerate()
        {
            match result {
                Ok(vector) => {
                    accepted.push(idx);
                    vectors.push(vector);
                }
                Err(e) => {
                    warn!("Skipping row {}: {}", idx, e);
                    summary.rows_rejected += 1;
                }
            }
        }
        summary.rows_encoded = vectors.len();

        let features = feature_frame(&schema, &vectors, &cleaned, &accepted)
            .context(PipelineStage::Encode.display_name())?;
        info!(
            "Step 7: Encoded {} rows ({} rejected)",
            summary.rows_encoded, summary.rows_rejected
        );

        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        self.report_progress(ProgressUpdate::complete(format!(
            "Training pipeline complete: {} rows encoded",
            summary.rows_encoded
        )));
        info!("Training pipeline complete in {}ms", summary.duration_ms);

        Ok(TrainingOutput {
            cleaned,
            encoders,
            features,
            summary,
        })
    }
}

/// Assemble encoded rows into a frame, carrying the `Price` target along.
fn feature_frame(
    schema: &[String],
    vectors: &[FeatureVector],
    cleaned: &DataFrame,
    accepted: &[usize],
) -> Result<DataFrame> {
    let mut df = DataFrame::empty();
    for (col_idx, name) in schema.iter().enumerate() {
        let values: Vec<f64> = vectors.iter().map(|v| v.values()[col_idx]).collect();
        df.with_column(Series::new(name.as_str().into(), values))?;
    }

    if let Ok(price) = cleaned.column(columns::PRICE) {
        let prices = optional_f64(price.as_materialized_series())?;
        let target: Vec<Option<f64>> = accepted.iter().map(|&idx| prices[idx]).collect();
        df.with_column(Series::new(columns::PRICE.into(), target))?;
    }

    Ok(df)
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for training runs.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let outliers = OutlierFilter::new(config.outlier_columns.clone(), config.iqr_multiplier);
        let engineer = FeatureEngineer::with_reference_year(config.reference_year)
            .with_drop_columns(config.drop_columns.clone());

        Ok(Pipeline {
            config,
            outliers,
            engineer,
            progress_reporter: self.progress_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::HandleUnknown;
    use crate::model::LinearPriceModel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn training_frame() -> DataFrame {
        df![
            "ID" => [45654403i64, 44731507, 45774419, 45769185, 45809263, 45802912, 45654403],
            "Price" => [10000i64, 12000, 14000, 16000, 18000, 20000, 10000],
            "Levy" => ["-", "1399", "1018", "-", "862", "1055", "-"],
            "Manufacturer" => ["TOYOTA", "LEXUS", "HONDA", "FORD", "HYUNDAI", "TOYOTA", "TOYOTA"],
            "Model" => ["Camry", "RX 450", "FIT", "Escape", "Santa FE", "Prius", "Camry"],
            "Prod. year" => [2010i64, 2015, 2012, 2018, 2008, 2020, 2010],
            "Category" => ["Sedan", "Jeep", "Hatchback", "Jeep", "Jeep", "Sedan", "Sedan"],
            "Leather interior" => ["Yes", "Yes", "No", "Yes", "Yes", "No", "Yes"],
            "Fuel type" => ["Petrol", "Hybrid", "Petrol", "Hybrid", "Diesel", "Hybrid", "Petrol"],
            "Engine volume" => ["2.0", "2.4", "1.8 Turbo", "2.5", "2.0", "1.6", "2.0"],
            "Mileage" => ["186005 km", "192000 km", "200000 km", "168966 km", "150000 km", "160931 km", "186005 km"],
            "Cylinders" => [4.0, 6.0, 4.0, 4.0, 4.0, 4.0, 4.0],
            "Gear box type" => ["Automatic", "Tiptronic", "Variator", "Automatic", "Automatic", "Automatic", "Automatic"],
            "Drive wheels" => ["Front", "4x4", "Front", "4x4", "Front", "Front", "Front"],
            "Doors" => ["04-May", "04-May", "04-May", "04-May", "04-May", "04-May", "04-May"],
            "Wheel" => ["Left wheel", "Left wheel", "Right-hand drive", "Left wheel", "Left wheel", "Left wheel", "Left wheel"],
            "Color" => ["Silver", "Black", "Black", "White", "Silver", "White", "Silver"],
            "Airbags" => [12i64, 8, 2, 0, 4, 12, 12],
        ]
        .unwrap()
    }

    fn pipeline() -> Pipeline {
        let config = PipelineConfig::builder().reference_year(2025).build().unwrap();
        Pipeline::builder().config(config).build().unwrap()
    }

    fn camry() -> RawRecord {
        serde_json::from_value(serde_json::json!({
            "Levy": "-",
            "Manufacturer": "TOYOTA",
            "Model": "Camry",
            "ProductionYear": 2015,
            "Category": "Sedan",
            "LeatherInterior": "Yes",
            "FuelType": "Petrol",
            "EngineVolume": "2.0",
            "Mileage": "120000 km",
            "Cylinders": 4,
            "GearBoxType": "Automatic",
            "DriveWheels": "Front",
            "Wheel": "Left wheel",
            "Color": "White",
            "Airbags": 6
        }))
        .unwrap()
    }

    fn artifacts_for(encoders: EncodingArtifacts) -> FittedArtifacts {
        let names = encoders.feature_names();
        let coefficients = names
            .iter()
            .map(|n| if n == "Leather interior_Yes" { 100.0 } else { 0.0 })
            .collect();
        let model = LinearPriceModel::new(names, coefficients, 15000.0).unwrap();
        FittedArtifacts::new(encoders, Arc::new(model)).unwrap()
    }

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert!(pipeline.config().remove_duplicates);
        assert_eq!(pipeline.reference_year(), crate::pipeline::features::current_year());
    }

    #[test]
    fn test_reference_year_pinning() {
        let pinned = pipeline();
        assert_eq!(pinned.engineer.pinned_year(), Some(2025));
        assert_eq!(pinned.reference_year(), 2025);

        let unpinned = Pipeline::builder().build().unwrap();
        assert_eq!(unpinned.engineer.pinned_year(), None);
    }

    #[test]
    fn test_pipeline_builder_rejects_invalid_config() {
        let config = PipelineConfig {
            iqr_multiplier: f64::NAN,
            ..Default::default()
        };
        assert!(Pipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_run_training() {
        let output = pipeline().run_training(training_frame()).unwrap();

        assert_eq!(output.summary.rows_input, 7);
        assert_eq!(output.summary.duplicates_removed, 1);
        assert_eq!(output.summary.outliers.rows_removed(), 0);
        assert_eq!(output.summary.rows_encoded, 6);
        assert_eq!(output.summary.rows_rejected, 0);

        assert!(output.cleaned.column("ID").is_err());
        assert!(output.cleaned.column("Doors").is_err());
        assert!(output.cleaned.column("Prod. year").is_err());
        let ages: Vec<Option<f64>> = output
            .cleaned
            .column("Age")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ages[0], Some(15.0));

        let schema = output.encoders.feature_names();
        assert_eq!(output.features.width(), schema.len() + 1);
        assert_eq!(output.features.height(), 6);
        assert!(output.features.column("Price").is_ok());
    }

    #[test]
    fn test_keep_duplicates() {
        let config = PipelineConfig::builder()
            .reference_year(2025)
            .remove_duplicates(false)
            .build()
            .unwrap();
        let output = Pipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .run_training(training_frame())
            .unwrap();
        assert_eq!(output.summary.duplicates_removed, 0);
        assert_eq!(output.summary.rows_encoded, 7);
    }

    #[test]
    fn test_predict_end_to_end() {
        let pipeline = pipeline();
        let output = pipeline.run_training(training_frame()).unwrap();
        let artifacts = artifacts_for(output.encoders);

        let features = pipeline.encode(&camry(), &artifacts).unwrap();
        assert_eq!(features.names(), artifacts.schema());
        assert_eq!(features.get("Levy").map(|v| v < 0.0), Some(true));

        // Only the leather interior indicator carries weight
        let price = pipeline.predict(&camry(), &artifacts).unwrap();
        assert_eq!(price, 15100.0);
    }

    #[test]
    fn test_predict_unknown_manufacturer() {
        let pipeline = pipeline();
        let output = pipeline.run_training(training_frame()).unwrap();
        let artifacts = artifacts_for(output.encoders);

        let mut record = camry();
        record.manufacturer = "ZASTAVA".to_string();
        let err = pipeline.predict(&record, &artifacts).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_CATEGORY");
        assert_eq!(err.field(), Some("Manufacturer"));
        assert!(err.to_string().starts_with("Encoding"));
    }

    #[test]
    fn test_predict_rejects_invalid_record() {
        let pipeline = pipeline();
        let output = pipeline.run_training(training_frame()).unwrap();
        let artifacts = artifacts_for(output.encoders);

        let mut record = camry();
        record.production_year = 2099i64.into();
        let err = pipeline.predict(&record, &artifacts).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RECORD");
    }

    #[test]
    fn test_predict_batch_isolates_failures() {
        let pipeline = pipeline();
        let output = pipeline.run_training(training_frame()).unwrap();
        let artifacts = artifacts_for(output.encoders);

        let mut bad = camry();
        bad.color = "Mauve".to_string();
        let results = pipeline.predict_batch(&[camry(), bad, camry()], &artifacts);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().error_code(), "UNKNOWN_CATEGORY");
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_run_training_with_rejects_unseen_rows() {
        let pipeline = pipeline();
        let fitted = pipeline.run_training(training_frame()).unwrap();
        let artifacts = artifacts_for(fitted.encoders);

        let mut df = training_frame();
        let manufacturers = Series::new(
            "Manufacturer".into(),
            &["TOYOTA", "LEXUS", "HONDA", "FORD", "LADA", "TOYOTA", "TOYOTA"],
        );
        df.replace("Manufacturer", manufacturers).unwrap();

        let output = pipeline.run_training_with(df, &artifacts).unwrap();
        assert_eq!(output.summary.rows_rejected, 1);
        assert_eq!(output.summary.rows_encoded, 5);
        assert_eq!(output.features.height(), 5);
        assert_eq!(&output.encoders, artifacts.encoders());
    }

    #[test]
    fn test_handle_unknown_ignore_is_fitted() {
        let config = PipelineConfig::builder()
            .reference_year(2025)
            .handle_unknown(HandleUnknown::Ignore)
            .build()
            .unwrap();
        let pipeline = Pipeline::builder().config(config).build().unwrap();
        let output = pipeline.run_training(training_frame()).unwrap();
        let artifacts = artifacts_for(output.encoders);

        let mut record = camry();
        record.wheel = "Left".to_string();
        assert!(pipeline.predict(&record, &artifacts).is_ok());
    }

    #[test]
    fn test_progress_callback_sees_stages() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let config = PipelineConfig::builder().reference_year(2025).build().unwrap();
        let pipeline = Pipeline::builder()
            .config(config)
            .on_progress(move |_update| {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        pipeline.run_training(training_frame()).unwrap();

        // Seven stages plus completion
        assert_eq!(call_count.load(Ordering::SeqCst), 8);
    }
}
