//! Record and feature types flowing through the pipeline.
//!
//! A request starts as a [`RawRecord`], becomes a [`CleanedRecord`] after
//! field normalization, an [`EngineeredRecord`] after feature engineering,
//! and finally a [`FeatureVector`] after encoding.

use crate::error::{PipelineError, Result};
use crate::utils::parse_numeric_text;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column names of the fitted training schema.
pub mod columns {
    pub const ID: &str = "ID";
    pub const PRICE: &str = "Price";
    pub const LEVY: &str = "Levy";
    pub const MANUFACTURER: &str = "Manufacturer";
    pub const MODEL: &str = "Model";
    pub const PRODUCTION_YEAR: &str = "Prod. year";
    pub const CATEGORY: &str = "Category";
    pub const LEATHER_INTERIOR: &str = "Leather interior";
    pub const FUEL_TYPE: &str = "Fuel type";
    pub const ENGINE_VOLUME: &str = "Engine volume";
    pub const MILEAGE: &str = "Mileage";
    pub const CYLINDERS: &str = "Cylinders";
    pub const GEAR_BOX_TYPE: &str = "Gear box type";
    pub const DRIVE_WHEELS: &str = "Drive wheels";
    pub const DOORS: &str = "Doors";
    pub const WHEEL: &str = "Wheel";
    pub const COLOR: &str = "Color";
    pub const AIRBAGS: &str = "Airbags";
    pub const AGE: &str = "Age";
}

/// Earliest production year accepted at the boundary.
pub const MIN_PRODUCTION_YEAR: i32 = 1886;

/// A loosely-typed scalar as received from a form or JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value. Text is trimmed and parsed; anything that
    /// is not a finite number yields `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) if v.is_finite() => Some(*v),
            Self::Float(_) => None,
            Self::Text(s) => parse_numeric_text(s),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// One vehicle quote request, as submitted.
///
/// Field names follow the form; aliases accept the snake-case names used by the
/// HTTP payload and the column names of the training dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Levy")]
    pub levy: FieldValue,
    #[serde(rename = "Manufacturer")]
    pub manufacturer: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "ProductionYear", alias = "Prod_year", alias = "Prod. year")]
    pub production_year: FieldValue,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(
        rename = "LeatherInterior",
        alias = "Leather_interior",
        alias = "Leather interior"
    )]
    pub leather_interior: String,
    #[serde(rename = "FuelType", alias = "Fuel_type", alias = "Fuel type")]
    pub fuel_type: String,
    #[serde(rename = "EngineVolume", alias = "Engine_volume", alias = "Engine volume")]
    pub engine_volume: FieldValue,
    #[serde(rename = "Mileage")]
    pub mileage: FieldValue,
    #[serde(rename = "Cylinders")]
    pub cylinders: FieldValue,
    #[serde(rename = "GearBoxType", alias = "Gear_box_type", alias = "Gear box type")]
    pub gear_box_type: String,
    #[serde(rename = "DriveWheels", alias = "Drive_wheels", alias = "Drive wheels")]
    pub drive_wheels: String,
    #[serde(rename = "Wheel")]
    pub wheel: String,
    #[serde(rename = "Color")]
    pub color: String,
    #[serde(rename = "Airbags")]
    pub airbags: FieldValue,
}

impl RawRecord {
    /// Boundary validation, run before a record enters the pipeline.
    ///
    /// Rejects empty categorical fields, non-numeric cylinder/airbag counts and
    /// numeric production years outside `[MIN_PRODUCTION_YEAR, reference_year + 1]`.
    /// A non-numeric production year is let through: it yields an undefined
    /// age that the encoder reports as a parse error.
    pub fn validate(&self, reference_year: i32) -> Result<()> {
        let categorical = [
            ("Manufacturer", &self.manufacturer),
            ("Model", &self.model),
            ("Category", &self.category),
            ("LeatherInterior", &self.leather_interior),
            ("FuelType", &self.fuel_type),
            ("GearBoxType", &self.gear_box_type),
            ("DriveWheels", &self.drive_wheels),
            ("Wheel", &self.wheel),
            ("Color", &self.color),
        ];
        for (field, value) in categorical {
            if value.trim().is_empty() {
                return Err(PipelineError::invalid_record(field, "must not be empty"));
            }
        }

        for (field, value) in [("Cylinders", &self.cylinders), ("Airbags", &self.airbags)] {
            match value.as_f64() {
                Some(v) if v >= 0.0 => {}
                Some(v) => {
                    return Err(PipelineError::invalid_record(
                        field,
                        format!("must not be negative, got {v}"),
                    ));
                }
                None => return Err(PipelineError::parse(field, value)),
            }
        }

        if let Some(year) = self.production_year.as_f64() {
            let max_year = reference_year + 1;
            if year.fract() != 0.0
                || year < f64::from(MIN_PRODUCTION_YEAR)
                || year > f64::from(max_year)
            {
                return Err(PipelineError::invalid_record(
                    "ProductionYear",
                    format!("expected a year in {MIN_PRODUCTION_YEAR}..={max_year}, got {year}"),
                ));
            }
        }

        Ok(())
    }
}

/// A record whose numeric fields have been normalized.
///
/// `levy` is always defined (fallback 0); engine volume and mileage stay
/// `None` when their text could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub levy: f64,
    pub manufacturer: String,
    pub model: String,
    pub production_year: Option<f64>,
    pub category: String,
    pub leather_interior: String,
    pub fuel_type: String,
    pub engine_volume: Option<f64>,
    pub mileage: Option<f64>,
    pub cylinders: Option<f64>,
    pub gear_box_type: String,
    pub drive_wheels: String,
    pub wheel: String,
    pub color: String,
    pub airbags: Option<f64>,
}

/// A cleaned record with `age` derived and the production year removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineeredRecord {
    pub levy: f64,
    pub manufacturer: String,
    pub model: String,
    pub category: String,
    pub leather_interior: String,
    pub fuel_type: String,
    pub engine_volume: Option<f64>,
    pub mileage: Option<f64>,
    pub cylinders: Option<f64>,
    pub gear_box_type: String,
    pub drive_wheels: String,
    pub wheel: String,
    pub color: String,
    pub airbags: Option<f64>,
    pub age: Option<f64>,
}

/// A single named cell of an engineered record.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Number(Option<f64>),
    Category(String),
}

impl EngineeredRecord {
    /// The record as `(field name, value)` pairs, in record order.
    ///
    /// Names are the record's own field names; the encoding adapter maps
    /// them onto fitted column names.
    pub fn columns(&self) -> Vec<(&'static str, ColumnValue)> {
        use ColumnValue::{Category, Number};
        vec![
            ("Levy", Number(Some(self.levy))),
            ("Manufacturer", Category(self.manufacturer.clone())),
            ("Model", Category(self.model.clone())),
            ("Category", Category(self.category.clone())),
            ("LeatherInterior", Category(self.leather_interior.clone())),
            ("FuelType", Category(self.fuel_type.clone())),
            ("EngineVolume", Number(self.engine_volume)),
            ("Mileage", Number(self.mileage)),
            ("Cylinders", Number(self.cylinders)),
            ("GearBoxType", Category(self.gear_box_type.clone())),
            ("DriveWheels", Category(self.drive_wheels.clone())),
            ("Wheel", Category(self.wheel.clone())),
            ("Color", Category(self.color.clone())),
            ("Airbags", Number(self.airbags)),
            ("Age", Number(self.age)),
        ]
    }
}

/// Fixed-width, ordered numeric input for the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub(crate) fn new(names: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a feature by column name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn camry() -> RawRecord {
        serde_json::from_value(json!({
            "Levy": "-",
            "Manufacturer": "Toyota",
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
            "Wheel": "Left",
            "Color": "White",
            "Airbags": 6
        }))
        .unwrap()
    }

    #[test]
    fn test_field_value_untagged() {
        let record = camry();
        assert_eq!(record.levy, FieldValue::Text("-".to_string()));
        assert_eq!(record.production_year, FieldValue::Int(2015));
        assert_eq!(record.cylinders.as_f64(), Some(4.0));
    }

    #[test]
    fn test_field_value_as_f64() {
        assert_eq!(FieldValue::from(" 3.5 ").as_f64(), Some(3.5));
        assert_eq!(FieldValue::from("abc").as_f64(), None);
        assert_eq!(FieldValue::Float(f64::NAN).as_f64(), None);
    }

    #[test]
    fn test_raw_record_accepts_api_aliases() {
        let record: RawRecord = serde_json::from_value(json!({
            "Levy": 500,
            "Manufacturer": "Toyota",
            "Model": "Camry",
            "Prod_year": 2015,
            "Category": "Sedan",
            "Leather_interior": "Yes",
            "Fuel_type": "Petrol",
            "Engine_volume": 2.0,
            "Mileage": 120000,
            "Cylinders": 4.0,
            "Gear_box_type": "Automatic",
            "Drive_wheels": "Front",
            "Wheel": "Left",
            "Color": "White",
            "Airbags": 6
        }))
        .unwrap();

        assert_eq!(record.production_year, FieldValue::Int(2015));
        assert_eq!(record.gear_box_type, "Automatic");
        assert_eq!(record.engine_volume, FieldValue::Float(2.0));
    }

    #[test]
    fn test_validate_accepts_valid_record() {
        assert!(camry().validate(2025).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_category() {
        let mut record = camry();
        record.color = "  ".to_string();
        let err = record.validate(2025).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RECORD");
        assert_eq!(err.field(), Some("Color"));
    }

    #[test]
    fn test_validate_rejects_implausible_year() {
        let mut record = camry();
        record.production_year = FieldValue::Int(3015);
        assert_eq!(record.validate(2025).unwrap_err().field(), Some("ProductionYear"));

        record.production_year = FieldValue::Int(1700);
        assert!(record.validate(2025).is_err());
    }

    #[test]
    fn test_validate_lets_textual_year_through() {
        let mut record = camry();
        record.production_year = FieldValue::from("unknown");
        assert!(record.validate(2025).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_numeric_airbags() {
        let mut record = camry();
        record.airbags = FieldValue::from("many");
        let err = record.validate(2025).unwrap_err();
        assert_eq!(err.error_code(), "PARSE_ERROR");
        assert_eq!(err.field(), Some("Airbags"));
    }

    #[test]
    fn test_feature_vector_lookup() {
        let fv = FeatureVector::new(
            vec!["Levy".to_string(), "Age".to_string()],
            vec![0.5, -1.0],
        );
        assert_eq!(fv.len(), 2);
        assert_eq!(fv.get("Age"), Some(-1.0));
        assert_eq!(fv.get("Price"), None);
        assert_eq!(fv.iter().next(), Some(("Levy", 0.5)));
    }
}
