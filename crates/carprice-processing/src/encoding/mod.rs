//! Encoding adapter: fitted-name mapping, categorical encoding and scaling.
//!
//! Turns an [`EngineeredRecord`] into the [`FeatureVector`] the model was fit
//! on. The steps are:
//!
//! 1. Rename record fields to fitted column names ([`COLUMN_RENAME_MAP`])
//! 2. One-hot encode the low-cardinality fields ([`ONE_HOT_FIELDS`])
//! 3. Label encode the high-cardinality fields ([`LABEL_FIELDS`])
//! 4. Standard scale the continuous fields ([`SCALED_FIELDS`])
//! 5. Assemble the canonical column order and compare it to the model schema
//!
//! A column set or order that differs from the model schema is never
//! reconciled; it fails with [`PipelineError::SchemaMismatch`].

mod label;
mod one_hot;
mod scaler;

pub use label::LabelEncoder;
pub use one_hot::{HandleUnknown, OneHotEncoder, OneHotField};
pub use scaler::StandardScaler;

use crate::error::{PipelineError, Result};
use crate::types::{ColumnValue, EngineeredRecord, FeatureVector, columns};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Record and API field names mapped to fitted column names.
///
/// Names not listed here are already fitted names and pass through.
pub static COLUMN_RENAME_MAP: &[(&str, &str)] = &[
    ("LeatherInterior", columns::LEATHER_INTERIOR),
    ("Leather_interior", columns::LEATHER_INTERIOR),
    ("FuelType", columns::FUEL_TYPE),
    ("Fuel_type", columns::FUEL_TYPE),
    ("EngineVolume", columns::ENGINE_VOLUME),
    ("Engine_volume", columns::ENGINE_VOLUME),
    ("GearBoxType", columns::GEAR_BOX_TYPE),
    ("Gear_box_type", columns::GEAR_BOX_TYPE),
    ("DriveWheels", columns::DRIVE_WHEELS),
    ("Drive_wheels", columns::DRIVE_WHEELS),
    ("ProductionYear", columns::PRODUCTION_YEAR),
    ("Prod_year", columns::PRODUCTION_YEAR),
];

/// Fields expanded into indicator columns, in output order.
pub const ONE_HOT_FIELDS: [&str; 4] = [
    columns::LEATHER_INTERIOR,
    columns::GEAR_BOX_TYPE,
    columns::DRIVE_WHEELS,
    columns::WHEEL,
];

/// Fields replaced by their index in a fitted vocabulary.
pub const LABEL_FIELDS: [&str; 5] = [
    columns::MANUFACTURER,
    columns::MODEL,
    columns::CATEGORY,
    columns::FUEL_TYPE,
    columns::COLOR,
];

/// Fields standardized by the scaler, in scaler order.
pub const SCALED_FIELDS: [&str; 4] = [
    columns::LEVY,
    columns::ENGINE_VOLUME,
    columns::MILEAGE,
    columns::AGE,
];

/// Leading model columns, before the one-hot block.
pub const BASE_FEATURES: [&str; 11] = [
    columns::LEVY,
    columns::MANUFACTURER,
    columns::MODEL,
    columns::CATEGORY,
    columns::FUEL_TYPE,
    columns::ENGINE_VOLUME,
    columns::MILEAGE,
    columns::CYLINDERS,
    columns::COLOR,
    columns::AIRBAGS,
    columns::AGE,
];

/// Map a record or API field name to its fitted column name.
pub fn rename_column(name: &str) -> &str {
    COLUMN_RENAME_MAP
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
        .unwrap_or(name)
}

/// Rename every mapped column of a frame to its fitted name.
pub fn rename_frame(df: DataFrame) -> Result<DataFrame> {
    let mut df = df;
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        let target = rename_column(&name);
        if target != name {
            debug!("Renaming column '{}' -> '{}'", name, target);
            df.rename(&name, target.into())?;
        }
    }
    Ok(df)
}

type FittedColumns = Vec<(&'static str, ColumnValue)>;

/// The engineered record keyed by fitted column names.
fn fitted_columns(record: &EngineeredRecord) -> FittedColumns {
    record
        .columns()
        .into_iter()
        .map(|(name, value)| (rename_column(name), value))
        .collect()
}

fn category<'a>(cols: &'a FittedColumns, field: &str) -> Result<&'a str> {
    match cols.iter().find(|(name, _)| *name == field) {
        Some((_, ColumnValue::Category(value))) => Ok(value),
        Some(_) => Err(PipelineError::encoding(field, "expected a categorical value")),
        None => Err(PipelineError::encoding(field, "value missing from record")),
    }
}

fn number(cols: &FittedColumns, field: &str) -> Result<Option<f64>> {
    match cols.iter().find(|(name, _)| *name == field) {
        Some((_, ColumnValue::Number(value))) => Ok(*value),
        Some(_) => Err(PipelineError::encoding(field, "expected a numeric value")),
        None => Err(PipelineError::encoding(field, "value missing from record")),
    }
}

/// Fitted encoders and scaler, as persisted next to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingArtifacts {
    pub one_hot: OneHotEncoder,
    pub label_encoders: BTreeMap<String, LabelEncoder>,
    pub scaler: StandardScaler,
}

impl EncodingArtifacts {
    /// Fit all encoders and the scaler on a batch of engineered records.
    pub fn fit(records: &[EngineeredRecord], handle_unknown: HandleUnknown) -> Result<Self> {
        if records.is_empty() {
            return Err(PipelineError::EmptyData(
                "cannot fit encoders on zero records".to_string(),
            ));
        }

        let rows: Vec<FittedColumns> = records.iter().map(fitted_columns).collect();

        let mut one_hot_columns = Vec::with_capacity(ONE_HOT_FIELDS.len());
        for field in ONE_HOT_FIELDS {
            let values = rows
                .iter()
                .map(|cols| category(cols, field))
                .collect::<Result<Vec<_>>>()?;
            one_hot_columns.push((field, values));
        }
        let one_hot = OneHotEncoder::fit(&one_hot_columns, handle_unknown)?;

        let mut label_encoders = BTreeMap::new();
        for field in LABEL_FIELDS {
            let values = rows
                .iter()
                .map(|cols| category(cols, field))
                .collect::<Result<Vec<_>>>()?;
            let encoder = LabelEncoder::fit(values)?;
            debug!("Fitted label encoder for '{}' ({} classes)", field, encoder.len());
            label_encoders.insert(field.to_string(), encoder);
        }

        let mut scaled_columns = Vec::with_capacity(SCALED_FIELDS.len());
        for field in SCALED_FIELDS {
            let values = rows
                .iter()
                .map(|cols| number(cols, field))
                .collect::<Result<Vec<_>>>()?;
            scaled_columns.push((field, values));
        }
        let scaler = StandardScaler::fit(&scaled_columns)?;

        debug!(
            "Fitted encoders on {} records ({} one-hot columns)",
            records.len(),
            one_hot.n_features_out()
        );

        Ok(Self {
            one_hot,
            label_encoders,
            scaler,
        })
    }

    /// Column names this adapter produces, in output order.
    pub fn feature_names(&self) -> Vec<String> {
        BASE_FEATURES
            .iter()
            .map(|s| s.to_string())
            .chain(self.one_hot.feature_names())
            .collect()
    }

    /// Encode one record and check it against `expected_schema`.
    pub fn transform(
        &self,
        record: &EngineeredRecord,
        expected_schema: &[String],
    ) -> Result<FeatureVector> {
        let cols = fitted_columns(record);

        let mut values = Vec::with_capacity(expected_schema.len());
        for field in BASE_FEATURES {
            let value = if LABEL_FIELDS.contains(&field) {
                let encoder = self.label_encoders.get(field).ok_or_else(|| {
                    PipelineError::encoding(field, "no label encoder fitted for this field")
                })?;
                encoder.transform(field, category(&cols, field)?)?
            } else if SCALED_FIELDS.contains(&field) {
                self.scaler.transform(field, number(&cols, field)?)?
            } else {
                number(&cols, field)?.ok_or_else(|| PipelineError::parse(field, "undefined"))?
            };
            values.push(value);
        }

        let one_hot_values = ONE_HOT_FIELDS
            .iter()
            .map(|field| Ok((*field, category(&cols, field)?)))
            .collect::<Result<Vec<_>>>()?;
        values.extend(self.one_hot.transform(&one_hot_values)?);

        let names = self.feature_names();
        if names != expected_schema {
            return Err(PipelineError::SchemaMismatch {
                expected: expected_schema.to_vec(),
                got: names,
            });
        }

        Ok(FeatureVector::new(names, values))
    }

    /// Encode each record independently; one result per record.
    pub fn transform_batch(
        &self,
        records: &[EngineeredRecord],
        expected_schema: &[String],
    ) -> Vec<Result<FeatureVector>> {
        records
            .iter()
            .map(|record| self.transform(record, expected_schema))
            .collect()
    }

    /// Structural checks on deserialized artifacts.
    pub fn validate(&self) -> Result<()> {
        self.one_hot
            .validate()
            .map_err(|reason| artifact_error("one_hot_encoder", reason))?;
        for (field, encoder) in &self.label_encoders {
            encoder
                .validate()
                .map_err(|reason| artifact_error("label_encoders", format!("{field}: {reason}")))?;
        }
        self.scaler
            .validate()
            .map_err(|reason| artifact_error("scaler", reason))
    }
}

fn artifact_error(name: &str, reason: String) -> PipelineError {
    PipelineError::ArtifactLoad {
        name: name.to_string(),
        reason,
    }
}
