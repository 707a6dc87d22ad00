//! IQR-based outlier removal for training data.
//!
//! Columns are filtered one after another. Each pass computes its quartiles
//! over the rows that survived the previous passes, so the column order
//! changes which rows survive. The fitted model was trained on data filtered
//! this way; a single joint predicate would produce a different training set.

use crate::error::Result;
use crate::types::columns;
use crate::utils::{non_null_f64, optional_f64, quantile_sorted};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bounds and outcome of one column pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilterReport {
    pub column: String,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub rows_removed: usize,
}

/// Summary of an outlier filtering run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub passes: Vec<ColumnFilterReport>,
}

impl OutlierReport {
    pub fn rows_removed(&self) -> usize {
        self.rows_before - self.rows_after
    }
}

/// Sequential IQR row filter.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierFilter {
    columns: Vec<String>,
    multiplier: f64,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new(Self::default_columns(), 1.5)
    }
}

impl OutlierFilter {
    /// Create a filter over `columns`, applied in the given order.
    pub fn new(columns: Vec<String>, multiplier: f64) -> Self {
        Self {
            columns,
            multiplier,
        }
    }

    /// Price, levy, engine volume and mileage, in that order.
    pub fn default_columns() -> Vec<String> {
        [
            columns::PRICE,
            columns::LEVY,
            columns::ENGINE_VOLUME,
            columns::MILEAGE,
        ]
        .iter()
        .map(|c| c.to_string())
        .collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Remove rows outside `[Q1 - k*IQR, Q3 + k*IQR]`, one column at a time.
    ///
    /// Rows holding a null in the column being filtered are removed too.
    /// Columns absent from the frame are skipped.
    pub fn apply(&self, df: DataFrame) -> Result<(DataFrame, OutlierReport)> {
        let mut df = df;
        let mut report = OutlierReport {
            rows_before: df.height(),
            ..Default::default()
        };

        for name in &self.columns {
            let series = match df.column(name) {
                Ok(col) => col.as_materialized_series().clone(),
                Err(_) => {
                    debug!("Outlier column '{}' absent, skipping", name);
                    continue;
                }
            };

            let mut sorted = non_null_f64(&series)?;
            sorted.sort_by(|a, b| a.total_cmp(b));
            let (Some(q1), Some(q3)) =
                (quantile_sorted(&sorted, 0.25), quantile_sorted(&sorted, 0.75))
            else {
                // Nothing defined to compare against: every row fails the bound check
                let removed = df.height();
                df = df.clear();
                debug!("Column '{}' has no values, removed all {} rows", name, removed);
                report.passes.push(ColumnFilterReport {
                    column: name.clone(),
                    lower_bound: f64::NAN,
                    upper_bound: f64::NAN,
                    rows_removed: removed,
                });
                continue;
            };

            let iqr = q3 - q1;
            let lower_bound = q1 - self.multiplier * iqr;
            let upper_bound = q3 + self.multiplier * iqr;

            let mask_values: Vec<bool> = optional_f64(&series)?
                .into_iter()
                .map(|v| v.is_some_and(|val| val >= lower_bound && val <= upper_bound))
                .collect();

            let before = df.height();
            let mask = BooleanChunked::from_slice("mask".into(), &mask_values);
            df = df.filter(&mask)?;
            let removed = before - df.height();

            debug!(
                "Column '{}': bounds [{:.3}, {:.3}], removed {} rows",
                name, lower_bound, upper_bound, removed
            );
            report.passes.push(ColumnFilterReport {
                column: name.clone(),
                lower_bound,
                upper_bound,
                rows_removed: removed,
            });
        }

        report.rows_after = df.height();
        Ok((df, report))
    }
}
