//! Standard scaling (z-score) for numeric fields.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Per-field mean and scale, applied as `(x - mean) / scale`.
///
/// Scale is the population standard deviation; constant fields get a scale
/// of 1 so they map to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    fields: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on `(field, values)` columns. Undefined and non-finite values are
    /// skipped; a column with none left is an error.
    pub fn fit(columns: &[(&str, Vec<Option<f64>>)]) -> Result<Self> {
        let mut fields = Vec::with_capacity(columns.len());
        let mut mean = Vec::with_capacity(columns.len());
        let mut scale = Vec::with_capacity(columns.len());

        for (name, values) in columns {
            let defined: Vec<f64> = values
                .iter()
                .flatten()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            if defined.is_empty() {
                return Err(PipelineError::EmptyData(format!(
                    "cannot fit scaler on column '{}' without values",
                    name
                )));
            }

            let n = defined.len() as f64;
            let m = defined.iter().sum::<f64>() / n;
            let variance = defined.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();

            fields.push(name.to_string());
            mean.push(m);
            scale.push(if std == 0.0 { 1.0 } else { std });
        }

        Ok(Self {
            fields,
            mean,
            scale,
        })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Scale one value of `field`. An undefined value is a parse error.
    pub fn transform(&self, field: &str, value: Option<f64>) -> Result<f64> {
        let idx = self
            .fields
            .iter()
            .position(|f| f == field)
            .ok_or_else(|| PipelineError::encoding(field, "scaler was not fitted on this field"))?;
        let value = value
            .filter(|v| v.is_finite())
            .ok_or_else(|| PipelineError::parse(field, "undefined"))?;
        Ok((value - self.mean[idx]) / self.scale[idx])
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.mean.len() != self.fields.len() || self.scale.len() != self.fields.len() {
            return Err(format!(
                "scaler has {} fields but {} means and {} scales",
                self.fields.len(),
                self.mean.len(),
                self.scale.len()
            ));
        }
        if let Some(pos) = self.scale.iter().position(|s| !s.is_finite() || *s <= 0.0) {
            return Err(format!(
                "scale of '{}' must be positive, got {}",
                self.fields[pos], self.scale[pos]
            ));
        }
        Ok(())
    }
}
