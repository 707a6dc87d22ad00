//! Feature engineering: vehicle age and column pruning.

use crate::error::{PipelineError, Result};
use crate::types::{CleanedRecord, EngineeredRecord, columns};
use crate::utils::{column_names, optional_f64, optional_strings};
use chrono::Datelike;
use polars::prelude::*;
use tracing::debug;

/// Derives `Age` from the production year and drops unused columns.
///
/// The reference year is either pinned at construction or read from the
/// clock on every call, so a long-lived engineer follows the calendar.
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    pinned_year: Option<i32>,
    clock: fn() -> i32,
    drop_columns: Vec<String>,
}

impl Default for FeatureEngineer {
    /// Unpinned: `Age` is computed against the current calendar year.
    fn default() -> Self {
        Self {
            pinned_year: None,
            clock: current_year,
            drop_columns: Self::default_drop_columns(),
        }
    }
}

/// The calendar year on the local clock.
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

impl FeatureEngineer {
    /// An engineer pinned to `reference_year`.
    pub fn new(reference_year: i32) -> Self {
        Self::with_reference_year(Some(reference_year))
    }

    /// Pinned when `year` is set, otherwise following the clock.
    pub fn with_reference_year(year: Option<i32>) -> Self {
        Self {
            pinned_year: year,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub(crate) fn with_clock(mut self, clock: fn() -> i32) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the list of columns dropped after `Age` is derived.
    pub fn with_drop_columns(mut self, drop_columns: Vec<String>) -> Self {
        self.drop_columns = drop_columns;
        self
    }

    /// The internal id, the door count and the raw production year.
    pub fn default_drop_columns() -> Vec<String> {
        [columns::ID, columns::DOORS, columns::PRODUCTION_YEAR]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    /// The pinned year, if any.
    pub fn pinned_year(&self) -> Option<i32> {
        self.pinned_year
    }

    /// The year `Age` is computed against right now.
    pub fn reference_year(&self) -> i32 {
        self.pinned_year.unwrap_or_else(self.clock)
    }

    fn age_from(reference_year: i32, production_year: Option<f64>) -> Option<f64> {
        production_year.map(|year| f64::from(reference_year) - year)
    }

    /// Derive `age` for a single record. Total: an undefined production year
    /// gives an undefined age.
    pub fn engineer(&self, record: CleanedRecord) -> EngineeredRecord {
        let age = Self::age_from(self.reference_year(), record.production_year);
        EngineeredRecord {
            levy: record.levy,
            manufacturer: record.manufacturer,
            model: record.model,
            category: record.category,
            leather_interior: record.leather_interior,
            fuel_type: record.fuel_type,
            engine_volume: record.engine_volume,
            mileage: record.mileage,
            cylinders: record.cylinders,
            gear_box_type: record.gear_box_type,
            drive_wheels: record.drive_wheels,
            wheel: record.wheel,
            color: record.color,
            airbags: record.airbags,
            age,
        }
    }

    /// Add an `Age` column computed from `Prod. year`.
    ///
    /// The production year is coerced to a number first; non-numeric values
    /// give a null age. A frame without a production year column gets an
    /// all-null `Age`.
    pub fn add_age(&self, df: DataFrame) -> Result<DataFrame> {
        let mut df = df;
        let years: Vec<Option<f64>> = match df.column(columns::PRODUCTION_YEAR) {
            Ok(col) => {
                let series = col.as_materialized_series();
                if series.dtype() == &DataType::String {
                    optional_strings(series)?
                        .into_iter()
                        .map(|v| v.and_then(|s| crate::utils::parse_numeric_text(&s)))
                        .collect()
                } else {
                    optional_f64(series)?
                }
            }
            Err(_) => {
                debug!("'{}' absent, Age will be undefined", columns::PRODUCTION_YEAR);
                vec![None; df.height()]
            }
        };

        let reference_year = self.reference_year();
        let ages: Vec<Option<f64>> = years
            .into_iter()
            .map(|y| Self::age_from(reference_year, y))
            .collect();
        let undefined = ages.iter().filter(|a| a.is_none()).count();
        df.with_column(Series::new(columns::AGE.into(), ages))?;
        debug!(
            "Derived '{}' with reference year {} ({} undefined)",
            columns::AGE,
            reference_year,
            undefined
        );

        Ok(df)
    }

    /// Drop the configured unused columns. Missing ones are ignored.
    pub fn drop_unused(&self, df: DataFrame) -> DataFrame {
        let present = column_names(&df);
        let to_drop: Vec<PlSmallStr> = self
            .drop_columns
            .iter()
            .filter(|c| present.contains(c))
            .map(|c| c.as_str().into())
            .collect();

        if to_drop.is_empty() {
            return df;
        }
        debug!("Dropping columns: {:?}", to_drop);
        df.drop_many(to_drop)
    }

    /// `add_age` followed by `drop_unused`.
    pub fn engineer_frame(&self, df: DataFrame) -> Result<DataFrame> {
        let df = self.add_age(df)?;
        Ok(self.drop_unused(df))
    }
}

/// Read an engineered frame back into typed records, one per row.
///
/// Expects the fitted column names; a missing column is a
/// [`PipelineError::ColumnNotFound`].
pub fn engineered_records(df: &DataFrame) -> Result<Vec<EngineeredRecord>> {
    let number = |name: &str| -> Result<Vec<Option<f64>>> {
        let col = df
            .column(name)
            .map_err(|_| PipelineError::ColumnNotFound(name.to_string()))?;
        Ok(optional_f64(col.as_materialized_series())?)
    };
    let text = |name: &str| -> Result<Vec<String>> {
        let col = df
            .column(name)
            .map_err(|_| PipelineError::ColumnNotFound(name.to_string()))?;
        Ok(optional_strings(col.as_materialized_series())?
            .into_iter()
            .map(|v| v.map(|s| s.trim().to_string()).unwrap_or_default())
            .collect())
    };

    let levy = number(columns::LEVY)?;
    let manufacturer = text(columns::MANUFACTURER)?;
    let model = text(columns::MODEL)?;
    let category = text(columns::CATEGORY)?;
    let leather_interior = text(columns::LEATHER_INTERIOR)?;
    let fuel_type = text(columns::FUEL_TYPE)?;
    let engine_volume = number(columns::ENGINE_VOLUME)?;
    let mileage = number(columns::MILEAGE)?;
    let cylinders = number(columns::CYLINDERS)?;
    let gear_box_type = text(columns::GEAR_BOX_TYPE)?;
    let drive_wheels = text(columns::DRIVE_WHEELS)?;
    let wheel = text(columns::WHEEL)?;
    let color = text(columns::COLOR)?;
    let airbags = number(columns::AIRBAGS)?;
    let age = number(columns::AGE)?;

    let records = (0..df.height())
        .map(|i| EngineeredRecord {
            levy: levy[i].unwrap_or(0.0),
            manufacturer: manufacturer[i].clone(),
            model: model[i].clone(),
            category: category[i].clone(),
            leather_interior: leather_interior[i].clone(),
            fuel_type: fuel_type[i].clone(),
            engine_volume: engine_volume[i],
            mileage: mileage[i],
            cylinders: cylinders[i],
            gear_box_type: gear_box_type[i].clone(),
            drive_wheels: drive_wheels[i].clone(),
            wheel: wheel[i].clone(),
            color: color[i].clone(),
            airbags: airbags[i],
            age: age[i],
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn cleaned(production_year: Option<f64>) -> CleanedRecord {
        CleanedRecord {
            levy: 0.0,
            manufacturer: "Toyota".to_string(),
            model: "Camry".to_string(),
            production_year,
            category: "Sedan".to_string(),
            leather_interior: "Yes".to_string(),
            fuel_type: "Petrol".to_string(),
            engine_volume: Some(2.0),
            mileage: Some(120000.0),
            cylinders: Some(4.0),
            gear_box_type: "Automatic".to_string(),
            drive_wheels: "Front".to_string(),
            wheel: "Left wheel".to_string(),
            color: "White".to_string(),
            airbags: Some(6.0),
        }
    }

    #[test]
    fn test_age_from_production_year() {
        let engineer = FeatureEngineer::new(2025);
        let record = engineer.engineer(cleaned(Some(2015.0)));
        assert_eq!(record.age, Some(10.0));
        assert_eq!(record.model, "Camry");
    }

    #[test]
    fn test_undefined_year_gives_undefined_age() {
        let engineer = FeatureEngineer::new(2025);
        assert_eq!(engineer.engineer(cleaned(None)).age, None);
    }

    #[test]
    fn test_default_uses_current_year() {
        let engineer = FeatureEngineer::default();
        assert_eq!(engineer.pinned_year(), None);
        assert_eq!(engineer.reference_year(), current_year());
    }

    static CLOCK_YEAR: AtomicI32 = AtomicI32::new(2025);

    fn test_clock() -> i32 {
        CLOCK_YEAR.load(Ordering::SeqCst)
    }

    #[test]
    fn test_unpinned_year_follows_clock_per_call() {
        let engineer = FeatureEngineer::default().with_clock(test_clock);

        CLOCK_YEAR.store(2025, Ordering::SeqCst);
        assert_eq!(engineer.engineer(cleaned(Some(2015.0))).age, Some(10.0));

        // Same engineer, new calendar year
        CLOCK_YEAR.store(2026, Ordering::SeqCst);
        assert_eq!(engineer.reference_year(), 2026);
        assert_eq!(engineer.engineer(cleaned(Some(2015.0))).age, Some(11.0));

        let df = df!["Prod. year" => [2016i64]].unwrap();
        let df = engineer.add_age(df).unwrap();
        let ages: Vec<Option<f64>> = df.column("Age").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(ages, vec![Some(10.0)]);
    }

    #[test]
    fn test_pinned_year_ignores_clock() {
        let engineer = FeatureEngineer::new(2020).with_clock(|| 2030);
        assert_eq!(engineer.pinned_year(), Some(2020));
        assert_eq!(engineer.reference_year(), 2020);
        assert_eq!(engineer.engineer(cleaned(Some(2015.0))).age, Some(5.0));
    }

    #[test]
    fn test_engineer_frame_adds_age_and_drops_columns() {
        let df = df![
            "ID" => [1i64, 2, 3],
            "Prod. year" => [2010i64, 2015, 2020],
            "Doors" => ["04-May", "04-May", "02-Mar"],
            "Model" => ["Camry", "Prius", "FIT"],
        ]
        .unwrap();

        let df = FeatureEngineer::new(2025).engineer_frame(df).unwrap();

        let names = column_names(&df);
        assert_eq!(names, vec!["Model".to_string(), "Age".to_string()]);
        let ages: Vec<Option<f64>> = df.column("Age").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(ages, vec![Some(15.0), Some(10.0), Some(5.0)]);
    }

    #[test]
    fn test_textual_year_coerced() {
        let df = df!["Prod. year" => ["2012", "unknown"]].unwrap();
        let df = FeatureEngineer::new(2024).add_age(df).unwrap();
        let ages: Vec<Option<f64>> = df.column("Age").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(ages, vec![Some(12.0), None]);
    }

    #[test]
    fn test_missing_year_column_gives_null_age() {
        let df = df!["Model" => ["Camry"]].unwrap();
        let df = FeatureEngineer::new(2024).add_age(df).unwrap();
        assert_eq!(df.column("Age").unwrap().null_count(), 1);
    }

    #[test]
    fn test_custom_drop_columns() {
        let df = df!["ID" => [1i64], "Doors" => ["04-May"]].unwrap();
        let df = FeatureEngineer::new(2024)
            .with_drop_columns(vec!["Doors".to_string()])
            .drop_unused(df);
        assert_eq!(column_names(&df), vec!["ID".to_string()]);
    }

    #[test]
    fn test_engineered_records_missing_column() {
        let df = df!["Levy" => [0.0]].unwrap();
        let err = engineered_records(&df).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }
}
