//! Shared helpers for parsing and column statistics.

use polars::prelude::*;

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 5] = [',', '$', '€', '£', ' '];

/// Clean a string for numeric parsing by removing formatting characters.
///
/// # Example
///
/// ```rust,ignore
/// use carprice_processing::utils::clean_numeric_string;
///
/// assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Parse a string as a finite `f64`, tolerating currency markers, thousands
/// separators and surrounding whitespace.
pub fn parse_numeric_text(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Quantile of already-sorted values using linear interpolation between the
/// closest ranks. Returns `None` for an empty slice.
pub fn quantile_sorted(values: &[f64], quantile: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let pos = quantile.clamp(0.0, 1.0) * (values.len() as f64 - 1.0);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return Some(values[lower]);
    }
    let weight = pos - lower as f64;
    Some(values[lower] + (values[upper] - values[lower]) * weight)
}

/// Non-null values of a column as `f64`, in row order.
pub fn non_null_f64(series: &Series) -> PolarsResult<Vec<f64>> {
    let float_series = series.cast(&DataType::Float64)?;
    Ok(float_series.f64()?.into_iter().flatten().collect())
}

/// Column values as `Option<f64>`, in row order.
pub fn optional_f64(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let float_series = series.cast(&DataType::Float64)?;
    Ok(float_series.f64()?.into_iter().collect())
}

/// Column values as owned strings (`None` for nulls), in row order.
pub fn optional_strings(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let str_series = series.cast(&DataType::String)?;
    Ok(str_series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Column names of a frame as owned strings.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_numeric_string() {
        assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
        assert_eq!(clean_numeric_string("€100"), "100");
        assert_eq!(clean_numeric_string("1 000"), "1000");
    }

    #[test]
    fn test_parse_numeric_text() {
        assert_eq!(parse_numeric_text("42"), Some(42.0));
        assert_eq!(parse_numeric_text(" 1,399 "), Some(1399.0));
        assert_eq!(parse_numeric_text("-"), None);
        assert_eq!(parse_numeric_text(""), None);
        assert_eq!(parse_numeric_text("inf"), None);
        assert_eq!(parse_numeric_text("hello"), None);
    }

    #[test]
    fn test_parse_numeric_text_strips_separators_and_currency() {
        // Formatted amounts keep their value instead of collapsing to missing.
        assert_eq!(parse_numeric_text("$1,399"), Some(1399.0));
        assert_eq!(parse_numeric_text("€12 345"), Some(12345.0));
        assert_eq!(parse_numeric_text("£1,234.50"), Some(1234.5));
        assert_eq!(parse_numeric_text("12 345 km"), None);
    }

    #[test]
    fn test_quantile_sorted_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&values, 0.25), Some(1.75));
        assert_eq!(quantile_sorted(&values, 0.5), Some(2.5));
        assert_eq!(quantile_sorted(&values, 0.75), Some(3.25));
        assert_eq!(quantile_sorted(&[], 0.5), None);
        assert_eq!(quantile_sorted(&[7.0], 0.25), Some(7.0));
    }

    #[test]
    fn test_column_helpers() {
        let series = Series::new("v".into(), &[Some(1.0), None, Some(3.0)]);
        assert_eq!(non_null_f64(&series).unwrap(), vec![1.0, 3.0]);
        assert_eq!(optional_f64(&series).unwrap(), vec![Some(1.0), None, Some(3.0)]);

        let text = Series::new("t".into(), &[Some("a"), None]);
        assert_eq!(
            optional_strings(&text).unwrap(),
            vec![Some("a".to_string()), None]
        );
    }
}
