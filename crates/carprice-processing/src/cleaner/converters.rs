//! Scalar and column conversions for malformed numeric fields.

use crate::types::FieldValue;
use crate::utils::parse_numeric_text;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;

/// Marker used by the source data for "no levy".
pub const NO_LEVY_SENTINEL: &str = "-";

static TURBO_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*turbo\s*$").expect("Invalid regex: turbo suffix"));

static DISTANCE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*km\s*$").expect("Invalid regex: distance suffix"));

/// Normalize a levy value. Never fails: the sentinel, unparseable text,
/// negative amounts and missing values all become 0.
pub fn normalize_levy(value: &FieldValue) -> f64 {
    match value {
        FieldValue::Text(s) if s.trim() == NO_LEVY_SENTINEL => 0.0,
        other => other.as_f64().filter(|v| *v >= 0.0).unwrap_or(0.0),
    }
}

/// Normalize an engine volume such as `"2.0 Turbo"`.
///
/// Returns `None` when nothing numeric remains after the turbo marker is
/// stripped.
pub fn normalize_engine_volume(value: &FieldValue) -> Option<f64> {
    strip_and_parse(value, &TURBO_SUFFIX)
}

/// Normalize a mileage such as `"120000 km"`.
pub fn normalize_mileage(value: &FieldValue) -> Option<f64> {
    strip_and_parse(value, &DISTANCE_SUFFIX)
}

fn strip_and_parse(value: &FieldValue, suffix: &Regex) -> Option<f64> {
    let parsed = match value {
        FieldValue::Text(s) => parse_numeric_text(&suffix.replace(s.trim(), "")),
        other => other.as_f64(),
    };
    parsed.filter(|v| *v >= 0.0)
}

/// Apply a scalar normalizer to every value of a column.
///
/// String columns are fed as text, numeric columns as floats. The result is
/// always a `Float64` column with the same name.
pub(crate) fn normalize_series<F>(series: &Series, normalize: F) -> PolarsResult<Series>
where
    F: Fn(Option<FieldValue>) -> Option<f64>,
{
    let values: Vec<Option<f64>> = if series.dtype() == &DataType::String {
        series
            .str()?
            .into_iter()
            .map(|v| normalize(v.map(|s| FieldValue::Text(s.to_string()))))
            .collect()
    } else {
        let float_series = series.cast(&DataType::Float64)?;
        float_series
            .f64()?
            .into_iter()
            .map(|v| normalize(v.map(FieldValue::Float)))
            .collect()
    };

    Ok(Series::new(series.name().clone(), values))
}

pub(crate) fn levy_series(series: &Series) -> PolarsResult<Series> {
    normalize_series(series, |v| Some(v.as_ref().map(normalize_levy).unwrap_or(0.0)))
}

pub(crate) fn engine_volume_series(series: &Series) -> PolarsResult<Series> {
    normalize_series(series, |v| v.as_ref().and_then(normalize_engine_volume))
}

pub(crate) fn mileage_series(series: &Series) -> PolarsResult<Series> {
    normalize_series(series, |v| v.as_ref().and_then(normalize_mileage))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_null_at(series: &Series, idx: usize) -> bool {
        matches!(series.get(idx).unwrap(), AnyValue::Null)
    }

    fn f64_at(series: &Series, idx: usize) -> f64 {
        series.get(idx).unwrap().try_extract::<f64>().unwrap()
    }

    // ========================================================================
    // Scalar normalizers
    // ========================================================================

    #[test]
    fn test_levy_sentinel_is_zero() {
        assert_eq!(normalize_levy(&FieldValue::from("-")), 0.0);
        assert_eq!(normalize_levy(&FieldValue::from("  -  ")), 0.0);
    }

    #[test]
    fn test_levy_parses_numbers_and_falls_back() {
        assert_eq!(normalize_levy(&FieldValue::from("1399")), 1399.0);
        assert_eq!(normalize_levy(&FieldValue::Int(500)), 500.0);
        assert_eq!(normalize_levy(&FieldValue::from("$1,050")), 1050.0);
        assert_eq!(normalize_levy(&FieldValue::from("n/a")), 0.0);
        assert_eq!(normalize_levy(&FieldValue::Float(-3.0)), 0.0);
    }

    #[test]
    fn test_engine_volume_strips_turbo() {
        assert_eq!(normalize_engine_volume(&FieldValue::from("2.0 Turbo")), Some(2.0));
        assert_eq!(normalize_engine_volume(&FieldValue::from("1.8Turbo")), Some(1.8));
        assert_eq!(normalize_engine_volume(&FieldValue::from("3.5")), Some(3.5));
        assert_eq!(normalize_engine_volume(&FieldValue::Float(2.4)), Some(2.4));
    }

    #[test]
    fn test_engine_volume_unparseable_is_undefined() {
        assert_eq!(normalize_engine_volume(&FieldValue::from("Turbo")), None);
        assert_eq!(normalize_engine_volume(&FieldValue::from("big")), None);
    }

    #[test]
    fn test_mileage_strips_distance_unit() {
        assert_eq!(normalize_mileage(&FieldValue::from("120000 km")), Some(120000.0));
        assert_eq!(normalize_mileage(&FieldValue::from("0 km")), Some(0.0));
        assert_eq!(normalize_mileage(&FieldValue::from("55000KM")), Some(55000.0));
        assert_eq!(normalize_mileage(&FieldValue::Int(8000)), Some(8000.0));
        assert_eq!(normalize_mileage(&FieldValue::from("far km")), None);
    }

    // ========================================================================
    // Column normalizers
    // ========================================================================

    #[test]
    fn test_levy_series_from_strings() {
        let series = Series::new("Levy".into(), &[Some("1399"), Some("-"), None, Some("x")]);
        let result = levy_series(&series).unwrap();

        assert_eq!(result.dtype(), &DataType::Float64);
        assert_eq!(f64_at(&result, 0), 1399.0);
        assert_eq!(f64_at(&result, 1), 0.0);
        assert_eq!(f64_at(&result, 2), 0.0);
        assert_eq!(f64_at(&result, 3), 0.0);
    }

    #[test]
    fn test_engine_volume_series_from_strings() {
        let series = Series::new("Engine volume".into(), &["3.5", "2.0 Turbo", "??"]);
        let result = engine_volume_series(&series).unwrap();

        assert_eq!(f64_at(&result, 0), 3.5);
        assert_eq!(f64_at(&result, 1), 2.0);
        assert!(is_null_at(&result, 2));
    }

    #[test]
    fn test_mileage_series_from_numbers() {
        let series = Series::new("Mileage".into(), &[Some(1000i64), None]);
        let result = mileage_series(&series).unwrap();

        assert_eq!(result.dtype(), &DataType::Float64);
        assert_eq!(f64_at(&result, 0), 1000.0);
        assert!(is_null_at(&result, 1));
    }

    #[test]
    fn test_series_keeps_name() {
        let series = Series::new("Mileage".into(), &["1 km"]);
        let result = mileage_series(&series).unwrap();
        assert_eq!(result.name().as_str(), "Mileage");
    }
}
