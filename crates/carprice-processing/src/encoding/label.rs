//! Label (ordinal) encoding for high-cardinality categorical fields.

use super::one_hot::{is_strictly_sorted, sorted_unique};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Maps each category to its index in the sorted vocabulary seen at fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learn the vocabulary of `values`.
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let classes = sorted_unique(values.into_iter());
        if classes.is_empty() {
            return Err(PipelineError::EmptyData(
                "cannot fit label encoder on empty data".to_string(),
            ));
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Index of `value`, or `None` if it was never seen.
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    /// Encode `value` of `field`.
    pub fn transform(&self, field: &str, value: &str) -> Result<f64> {
        self.index_of(value)
            .map(|idx| idx as f64)
            .ok_or_else(|| PipelineError::unknown_category(field, value))
    }

    /// The category at `index`.
    pub fn inverse(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.classes.is_empty() {
            return Err("label encoder has no classes".to_string());
        }
        if !is_strictly_sorted(&self.classes) {
            return Err("label encoder classes are not sorted and unique".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_sorts_vocabulary() {
        let enc = LabelEncoder::fit(["Toyota", "BMW", "Toyota", "Honda"]).unwrap();
        assert_eq!(enc.classes(), ["BMW", "Honda", "Toyota"]);
        assert_eq!(enc.transform("Manufacturer", "Toyota").unwrap(), 2.0);
        assert_eq!(enc.inverse(0), Some("BMW"));
    }

    #[test]
    fn test_unseen_value() {
        let enc = LabelEncoder::fit(["Toyota"]).unwrap();
        let err = enc.transform("Manufacturer", "Zastava").unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_CATEGORY");
        assert_eq!(err.field(), Some("Manufacturer"));
    }

    #[test]
    fn test_fit_empty() {
        assert!(LabelEncoder::fit(std::iter::empty()).is_err());
    }

    #[test]
    fn test_validate_rejects_unsorted_artifact() {
        let enc: LabelEncoder =
            serde_json::from_str(r#"{"classes": ["Toyota", "BMW"]}"#).unwrap();
        assert!(enc.validate().is_err());
    }
}
