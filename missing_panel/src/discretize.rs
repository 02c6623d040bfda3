//! Quantile indicator construction for continuous columns.
//!
//! Thresholds are linear-interpolation percentiles of the observed values.
//! The boundary rules are asymmetric on purpose: the low band is `<= p25`,
//! the middle band is strictly between `p25` and `p75`, and the high band is
//! `>= p75`. With heavily tied data a row can land in two bands (when
//! `p25 == p75`) and that is preserved.

use crate::dataset::{float_column, numeric_column, with_columns, without_columns};
use crate::math::descriptive::{observed, quantile};
use crate::AnalysisError;
use polars::prelude::*;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantileMode {
    /// Three indicators: bottom quartile, interquartile band, top quartile.
    Quartiles,
    /// One indicator for values at or below the median.
    Median,
}

/// Names of the indicator columns produced for `column`, in output order.
pub fn indicator_names(column: &str, mode: QuantileMode) -> Vec<String> {
    match mode {
        QuantileMode::Quartiles => vec![
            format!("{}_p25", column),
            format!("{}_p25_75", column),
            format!("{}_p75", column),
        ],
        QuantileMode::Median => vec![format!("low_{}", column)],
    }
}

fn indicator(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// Builds the indicator vectors for one column of values.
///
/// A missing source value is missing in every indicator. A column without any
/// observed value yields indicators that are missing everywhere.
pub fn discretize_values(values: &[Option<f64>], mode: QuantileMode) -> Vec<Vec<Option<f64>>> {
    let obs = observed(values);
    match mode {
        QuantileMode::Quartiles => {
            let (Some(p25), Some(p75)) = (quantile(&obs, 0.25), quantile(&obs, 0.75)) else {
                return vec![vec![None; values.len()]; 3];
            };
            let band = |test: &dyn Fn(f64) -> bool| -> Vec<Option<f64>> {
                values.iter().map(|v| v.map(|x| indicator(test(x)))).collect()
            };
            vec![
                band(&|x| x <= p25),
                band(&|x| x > p25 && x < p75),
                band(&|x| x >= p75),
            ]
        }
        QuantileMode::Median => {
            let Some(p50) = quantile(&obs, 0.5) else {
                return vec![vec![None; values.len()]];
            };
            vec![values.iter().map(|v| v.map(|x| indicator(x <= p50))).collect()]
        }
    }
}

/// Converts one continuous column into its indicator block.
///
/// Returns a new frame holding only the indicator columns.
pub fn discretize(
    df: &DataFrame,
    column: &str,
    mode: QuantileMode,
) -> Result<DataFrame, AnalysisError> {
    let values = numeric_column(df, column)?;
    let columns = indicator_names(column, mode)
        .iter()
        .zip(discretize_values(&values, mode))
        .map(|(name, v)| float_column(name, v))
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Returns a copy of `df` where every listed column is replaced by its
/// indicator block. Indicator columns are appended after the remaining columns.
pub fn replace_with_indicators(
    df: &DataFrame,
    quartile_columns: &[String],
    median_columns: &[String],
) -> Result<DataFrame, AnalysisError> {
    let mut new_columns = Vec::new();
    let plan = quartile_columns
        .iter()
        .map(|c| (c, QuantileMode::Quartiles))
        .chain(median_columns.iter().map(|c| (c, QuantileMode::Median)));
    for (column, mode) in plan {
        let values = numeric_column(df, column)?;
        let names = indicator_names(column, mode);
        debug!(column = %column, indicators = ?names, "discretizing");
        new_columns.extend(names.into_iter().zip(discretize_values(&values, mode)));
    }
    let sources: Vec<String> = quartile_columns
        .iter()
        .chain(median_columns.iter())
        .cloned()
        .collect();
    let trimmed = without_columns(df, &sources)?;
    with_columns(&trimmed, new_columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::column_names;

    fn col(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_quartiles_one_to_five() {
        // p25 = 2, p75 = 4
        let out = discretize_values(&col(&[1.0, 2.0, 3.0, 4.0, 5.0]), QuantileMode::Quartiles);
        assert_eq!(out[0], col(&[1.0, 1.0, 0.0, 0.0, 0.0]));
        assert_eq!(out[1], col(&[0.0, 0.0, 1.0, 0.0, 0.0]));
        assert_eq!(out[2], col(&[0.0, 0.0, 0.0, 1.0, 1.0]));
    }

    #[test]
    fn test_missing_source_stays_missing() {
        let values = vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)];
        let out = discretize_values(&values, QuantileMode::Quartiles);
        for band in &out {
            assert_eq!(band[1], None);
        }
        for row in [0, 2, 3, 4] {
            let total: f64 = out.iter().map(|band| band[row].unwrap()).sum();
            assert_eq!(total, 1.0);
        }
    }

    #[test]
    fn test_tied_boundaries_keep_inequality_directions() {
        // p25 == p75 == 1: the tied rows fall in both outer bands.
        let out = discretize_values(&col(&[1.0, 1.0, 1.0, 1.0, 9.0]), QuantileMode::Quartiles);
        assert_eq!(out[0][0], Some(1.0));
        assert_eq!(out[1][0], Some(0.0));
        assert_eq!(out[2][0], Some(1.0));
        assert_eq!(out[0][4], Some(0.0));
        assert_eq!(out[2][4], Some(1.0));
    }

    #[test]
    fn test_median_indicator() {
        let df = df!("income" => &[Some(4.0), Some(1.0), None, Some(3.0), Some(2.0)]).unwrap();
        let out = discretize(&df, "income", QuantileMode::Median).unwrap();
        assert_eq!(column_names(&out), vec!["low_income"]);
        assert_eq!(
            numeric_column(&out, "low_income").unwrap(),
            vec![Some(0.0), Some(1.0), None, Some(0.0), Some(1.0)]
        );
    }

    #[test]
    fn test_replace_with_indicators() {
        let df = df!(
            "age" => &[20.0, 30.0, 40.0, 50.0],
            "income" => &[1.0, 2.0, 3.0, 4.0],
            "female" => &[0.0, 1.0, 1.0, 0.0]
        )
        .unwrap();
        let out =
            replace_with_indicators(&df, &["age".to_string()], &["income".to_string()]).unwrap();
        assert_eq!(
            column_names(&out),
            vec!["female", "age_p25", "age_p25_75", "age_p75", "low_income"]
        );
    }
}
