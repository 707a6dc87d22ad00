//! Configuration for the price pipeline.
//!
//! Training-mode options use the builder pattern; inference only reads the
//! reference year.

use crate::encoding::HandleUnknown;
use crate::error::PipelineError;
use crate::pipeline::features::{FeatureEngineer, current_year};
use crate::pipeline::outliers::OutlierFilter;
use crate::types::MIN_PRODUCTION_YEAR;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the price pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use carprice_processing::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .reference_year(2025)
///     .iqr_multiplier(3.0)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Whether to remove exact duplicate rows before anything else.
    /// Default: true
    pub remove_duplicates: bool,

    /// Columns filtered for outliers, in filtering order.
    /// Default: Price, Levy, Engine volume, Mileage
    pub outlier_columns: Vec<String>,

    /// IQR multiplier `k` for the bounds `[Q1 - k*IQR, Q3 + k*IQR]`.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Columns dropped after `Age` is derived.
    /// Default: ID, Doors, Prod. year
    pub drop_columns: Vec<String>,

    /// Year used to compute `Age`. `None` means the current calendar year,
    /// read each time a record or frame is engineered.
    /// Default: None
    pub reference_year: Option<i32>,

    /// Policy for categories the one-hot encoder did not see at fit.
    /// Default: Error
    pub handle_unknown: HandleUnknown,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
            outlier_columns: OutlierFilter::default_columns(),
            iqr_multiplier: 1.5,
            drop_columns: FeatureEngineer::default_drop_columns(),
            reference_year: None,
            handle_unknown: HandleUnknown::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file and validate it.
    ///
    /// Fields missing from the file take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// The reference year, falling back to the current calendar year.
    pub fn resolved_reference_year(&self) -> i32 {
        self.reference_year.unwrap_or_else(current_year)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(ConfigValidationError::InvalidMultiplier(self.iqr_multiplier));
        }

        if let Some(year) = self.reference_year
            && year < MIN_PRODUCTION_YEAR
        {
            return Err(ConfigValidationError::InvalidReferenceYear(year));
        }

        if let Some(column) = self.outlier_columns.iter().find(|c| c.trim().is_empty()) {
            return Err(ConfigValidationError::EmptyColumnName {
                field: "outlier_columns".to_string(),
                value: column.clone(),
            });
        }

        if let Some(column) = self.drop_columns.iter().find(|c| c.trim().is_empty()) {
            return Err(ConfigValidationError::EmptyColumnName {
                field: "drop_columns".to_string(),
                value: column.clone(),
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid IQR multiplier: {0} (must be a non-negative number)")]
    InvalidMultiplier(f64),

    #[error("Invalid reference year: {0} (must be at least {MIN_PRODUCTION_YEAR})")]
    InvalidReferenceYear(i32),

    #[error("Empty column name in '{field}': {value:?}")]
    EmptyColumnName { field: String, value: String },
}

impl From<ConfigValidationError> for PipelineError {
    fn from(err: ConfigValidationError) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    remove_duplicates: Option<bool>,
    outlier_columns: Option<Vec<String>>,
    iqr_multiplier: Option<f64>,
    drop_columns: Option<Vec<String>>,
    reference_year: Option<i32>,
    handle_unknown: Option<HandleUnknown>,
}

impl PipelineConfigBuilder {
    /// Enable or disable duplicate row removal.
    pub fn remove_duplicates(mut self, remove: bool) -> Self {
        self.remove_duplicates = Some(remove);
        self
    }

    /// Set the outlier columns. Order matters: each column is filtered on the
    /// rows that survived the previous ones.
    pub fn outlier_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outlier_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the IQR multiplier.
    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    /// Set the columns dropped after feature engineering.
    pub fn drop_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drop_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Pin the year used to compute `Age`.
    pub fn reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    /// Set the unknown-category policy of newly fitted one-hot encoders.
    pub fn handle_unknown(mut self, policy: HandleUnknown) -> Self {
        self.handle_unknown = Some(policy);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            remove_duplicates: self.remove_duplicates.unwrap_or(true),
            outlier_columns: self
                .outlier_columns
                .unwrap_or_else(OutlierFilter::default_columns),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(1.5),
            drop_columns: self
                .drop_columns
                .unwrap_or_else(FeatureEngineer::default_drop_columns),
            reference_year: self.reference_year,
            handle_unknown: self.handle_unknown.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}
