//! Field normalization and row cleaning.
//!
//! This module provides:
//! - Scalar normalizers for levy, engine volume and mileage
//! - The same rules applied to whole DataFrame columns
//! - Duplicate row removal for batch data
//! - CSV loading that keeps malformed numeric columns textual

mod converters;

pub use converters::{
    NO_LEVY_SENTINEL, normalize_engine_volume, normalize_levy, normalize_mileage,
};

use crate::error::{Result, ResultExt};
use crate::types::{CleanedRecord, RawRecord, columns};
use polars::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Columns read as strings regardless of what schema inference sees, so
/// `"-"`, `"2.0 Turbo"` or `"120000 km"` deep in a file reach the normalizer.
pub const TEXTUAL_COLUMNS: [&str; 3] = [columns::LEVY, columns::ENGINE_VOLUME, columns::MILEAGE];

/// Normalizes malformed scalar fields into numeric form.
pub struct FieldNormalizer;

impl FieldNormalizer {
    /// Normalize a single record. Pure; the input is left untouched.
    pub fn normalize_record(record: &RawRecord) -> CleanedRecord {
        CleanedRecord {
            levy: normalize_levy(&record.levy),
            manufacturer: record.manufacturer.trim().to_string(),
            model: record.model.trim().to_string(),
            production_year: record.production_year.as_f64(),
            category: record.category.trim().to_string(),
            leather_interior: record.leather_interior.trim().to_string(),
            fuel_type: record.fuel_type.trim().to_string(),
            engine_volume: normalize_engine_volume(&record.engine_volume),
            mileage: normalize_mileage(&record.mileage),
            cylinders: record.cylinders.as_f64(),
            gear_box_type: record.gear_box_type.trim().to_string(),
            drive_wheels: record.drive_wheels.trim().to_string(),
            wheel: record.wheel.trim().to_string(),
            color: record.color.trim().to_string(),
            airbags: record.airbags.as_f64(),
        }
    }

    /// Normalize the levy, engine volume and mileage columns of a frame.
    ///
    /// Each present column is replaced by a `Float64` column; absent columns
    /// are skipped.
    pub fn normalize_frame(df: DataFrame) -> Result<DataFrame> {
        let mut df = df;

        type Converter = fn(&Series) -> PolarsResult<Series>;
        let conversions: [(&str, Converter); 3] = [
            (columns::LEVY, converters::levy_series),
            (columns::ENGINE_VOLUME, converters::engine_volume_series),
            (columns::MILEAGE, converters::mileage_series),
        ];

        for (name, convert) in conversions {
            let converted = match df.column(name) {
                Ok(col) => convert(col.as_materialized_series())?,
                Err(_) => {
                    debug!("Column '{}' absent, skipping normalization", name);
                    continue;
                }
            };
            let undefined = converted.null_count();
            df.replace(name, converted)?;
            debug!("Normalized '{}' ({} undefined values)", name, undefined);
        }

        Ok(df)
    }
}

/// Row-level cleaning for batch data.
pub struct DataCleaner;

impl DataCleaner {
    /// Remove exact duplicate rows, keeping the first occurrence.
    ///
    /// Returns the deduplicated frame and the number of rows removed.
    pub fn remove_duplicates(df: DataFrame) -> Result<(DataFrame, usize)> {
        let before = df.height();
        let df = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
        let removed = before - df.height();

        if removed > 0 {
            debug!("Removed {} duplicate rows", removed);
        } else {
            debug!("No duplicate rows found");
        }

        Ok((df, removed))
    }
}

/// Read a listings CSV with a header row.
///
/// [`TEXTUAL_COLUMNS`] present in the header are forced to `String`; every
/// other column is inferred from the first `infer_schema_length` rows.
pub fn read_listings_csv(
    path: impl AsRef<Path>,
    infer_schema_length: Option<usize>,
) -> Result<DataFrame> {
    let path = path.as_ref().to_path_buf();
    let context = format!("Reading {}", path.display());

    let header = CsvReadOptions::default()
        .with_has_header(true)
        .with_n_rows(Some(0))
        .try_into_reader_with_file_path(Some(path.clone()))
        .and_then(|reader| reader.finish())
        .context(context.as_str())?;

    let overrides: Schema = header
        .get_column_names()
        .into_iter()
        .filter(|name| TEXTUAL_COLUMNS.contains(&name.as_str()))
        .map(|name| Field::new(name.clone(), DataType::String))
        .collect();
    debug!("Forcing {} columns to text", overrides.len());

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(infer_schema_length)
        .with_schema_overwrite(Some(Arc::new(overrides)))
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path))
        .and_then(|reader| reader.finish())
        .context(context)
}
