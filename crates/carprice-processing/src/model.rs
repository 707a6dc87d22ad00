//! Price model collaborator.
//!
//! The pipeline only needs two things from a trained model: the ordered list
//! of feature names it was fit on, and a prediction for a feature vector in
//! that order. [`PriceModel`] captures exactly that, so any regressor (or a
//! test double) can be plugged in.
//!
//! [`LinearPriceModel`] is the bundled implementation: an intercept plus one
//! coefficient per feature, persisted as JSON.
//!
//! # Example
//!
//! ```rust,ignore
//! use carprice_processing::{LinearPriceModel, PriceModel};
//!
//! let model = LinearPriceModel::load("artifacts/model.json")?;
//! let price = model.predict(&features)?;
//! ```

use crate::error::{PipelineError, Result};
use crate::types::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A trained regressor over a fixed feature schema.
pub trait PriceModel: Send + Sync + fmt::Debug {
    /// Feature names, in the order the model was fit on.
    fn feature_names(&self) -> &[String];

    /// Predict a price. `features` must follow [`feature_names`](Self::feature_names).
    fn predict(&self, features: &FeatureVector) -> Result<f64>;
}

/// Linear regression: `intercept + Σ coefficient_i · x_i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPriceModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearPriceModel {
    pub fn new(feature_names: Vec<String>, coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        let model = Self {
            version: None,
            feature_names,
            coefficients,
            intercept,
        };
        model.validate()?;
        Ok(model)
    }

    /// Load a model from a JSON file.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Io`] if the file cannot be read
    /// - [`PipelineError::Json`] if it is not a valid model document
    /// - [`PipelineError::ArtifactLoad`] if coefficients and feature names
    ///   disagree
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let model: Self = serde_json::from_str(&content)?;
        model.validate()?;
        Ok(model)
    }

    /// Write the model as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.coefficients.len() != self.feature_names.len() {
            return Err(PipelineError::ArtifactLoad {
                name: "model".to_string(),
                reason: format!(
                    "{} coefficients for {} features",
                    self.coefficients.len(),
                    self.feature_names.len()
                ),
            });
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(PipelineError::ArtifactLoad {
                name: "model".to_string(),
                reason: "coefficients must be finite".to_string(),
            });
        }
        Ok(())
    }
}

impl PriceModel for LinearPriceModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        if features.names() != self.feature_names.as_slice() {
            return Err(PipelineError::SchemaMismatch {
                expected: self.feature_names.clone(),
                got: features.names().to_vec(),
            });
        }

        let prediction = self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.values())
                .map(|(c, x)| c * x)
                .sum::<f64>();
        Ok(prediction)
    }
}
