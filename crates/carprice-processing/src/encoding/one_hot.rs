//! One-hot encoding for low-cardinality categorical fields.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Strategy for handling unknown categories during transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    /// Reject the record with an unknown category error.
    #[default]
    Error,
    /// Emit an all-zero block for the field.
    Ignore,
}

impl std::str::FromStr for HandleUnknown {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!("unknown policy '{}', expected 'error' or 'ignore'", other)),
        }
    }
}

/// Categories learned for one input field, sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotField {
    pub name: String,
    pub categories: Vec<String>,
}

/// Fitted one-hot encoder over an ordered set of fields.
///
/// Output columns are named `<field>_<category>`, fields in fit order and
/// categories sorted within each field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    fields: Vec<OneHotField>,
    #[serde(default)]
    handle_unknown: HandleUnknown,
}

impl OneHotEncoder {
    /// Build an encoder from explicit categories. Categories are sorted and
    /// deduplicated.
    pub fn new(fields: Vec<OneHotField>, handle_unknown: HandleUnknown) -> Self {
        let fields = fields
            .into_iter()
            .map(|f| OneHotField {
                categories: sorted_unique(f.categories.iter().map(String::as_str)),
                name: f.name,
            })
            .collect();
        Self {
            fields,
            handle_unknown,
        }
    }

    /// Learn the categories of each `(field, values)` column.
    pub fn fit(columns: &[(&str, Vec<&str>)], handle_unknown: HandleUnknown) -> Result<Self> {
        let mut fields = Vec::with_capacity(columns.len());
        for (name, values) in columns {
            if values.is_empty() {
                return Err(PipelineError::EmptyData(format!(
                    "cannot fit one-hot encoder on empty column '{}'",
                    name
                )));
            }
            fields.push(OneHotField {
                name: name.to_string(),
                categories: sorted_unique(values.iter().copied()),
            });
        }
        Ok(Self {
            fields,
            handle_unknown,
        })
    }

    pub fn fields(&self) -> &[OneHotField] {
        &self.fields
    }

    pub fn handle_unknown(&self) -> HandleUnknown {
        self.handle_unknown
    }

    /// Number of output columns.
    pub fn n_features_out(&self) -> usize {
        self.fields.iter().map(|f| f.categories.len()).sum()
    }

    /// Output column names, in output order.
    pub fn feature_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|f| {
                f.categories
                    .iter()
                    .map(move |c| format!("{}_{}", f.name, c))
            })
            .collect()
    }

    /// Indicator block for one field's value.
    pub fn transform_field(&self, field: &str, value: &str) -> Result<Vec<f64>> {
        let fitted = self
            .fields
            .iter()
            .find(|f| f.name == field)
            .ok_or_else(|| PipelineError::encoding(field, "one-hot encoder was not fitted on this field"))?;

        let mut block = vec![0.0; fitted.categories.len()];
        match fitted
            .categories
            .binary_search_by(|c| c.as_str().cmp(value))
        {
            Ok(idx) => block[idx] = 1.0,
            Err(_) => match self.handle_unknown {
                HandleUnknown::Error => {
                    return Err(PipelineError::unknown_category(field, value));
                }
                HandleUnknown::Ignore => {}
            },
        }
        Ok(block)
    }

    /// Encode `(field, value)` pairs, one per fitted field in fit order.
    ///
    /// Every fitted field must be supplied; extra fields are an error.
    pub fn transform(&self, values: &[(&str, &str)]) -> Result<Vec<f64>> {
        for (field, _) in values {
            if !self.fields.iter().any(|f| f.name == *field) {
                return Err(PipelineError::encoding(
                    *field,
                    "one-hot encoder was not fitted on this field",
                ));
            }
        }

        let mut out = Vec::with_capacity(self.n_features_out());
        for fitted in &self.fields {
            let value = values
                .iter()
                .find(|(name, _)| *name == fitted.name)
                .map(|(_, v)| *v)
                .ok_or_else(|| PipelineError::encoding(&fitted.name, "value missing from record"))?;
            out.extend(self.transform_field(&fitted.name, value)?);
        }
        Ok(out)
    }

    /// Check that categories are sorted and unique, as `fit` leaves them.
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        for field in &self.fields {
            if !is_strictly_sorted(&field.categories) {
                return Err(format!(
                    "categories of '{}' are not sorted and unique",
                    field.name
                ));
            }
        }
        Ok(())
    }
}

pub(crate) fn sorted_unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub(crate) fn is_strictly_sorted(values: &[String]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
