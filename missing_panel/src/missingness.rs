//! Row-level missingness indicators.

use crate::config::FlagNames;
use crate::dataset::{numeric_column, numeric_columns, with_columns};
use crate::AnalysisError;
use polars::prelude::*;
use tracing::debug;

/// The two per-row indicators, as 0/1 values without missing entries.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingnessFlags {
    /// 1 when any covariate of the row is missing.
    pub covariates: Vec<f64>,
    /// 1 when the outcome of the row is missing.
    pub outcome: Vec<f64>,
}

impl MissingnessFlags {
    pub fn compute(
        df: &DataFrame,
        covariates: &[String],
        outcome: &str,
    ) -> Result<Self, AnalysisError> {
        let columns = numeric_columns(df, covariates)?;
        let outcome_values = numeric_column(df, outcome)?;
        let n = df.height();

        let covariate_flags: Vec<f64> = (0..n)
            .map(|i| {
                let any_missing = columns.iter().any(|c| c[i].is_none());
                if any_missing {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let outcome_flags: Vec<f64> = outcome_values
            .iter()
            .map(|v| if v.is_none() { 1.0 } else { 0.0 })
            .collect();

        debug!(
            rows = n,
            missing_covariates = covariate_flags.iter().sum::<f64>(),
            missing_outcome = outcome_flags.iter().sum::<f64>(),
            "computed missingness flags"
        );
        Ok(Self {
            covariates: covariate_flags,
            outcome: outcome_flags,
        })
    }
}

/// Returns a copy of `df` with the two missingness indicator columns added.
///
/// The source frame is left untouched; an existing column with one of the
/// flag names is replaced in the copy.
pub fn add_missingness_flags(
    df: &DataFrame,
    covariates: &[String],
    outcome: &str,
    names: &FlagNames,
) -> Result<DataFrame, AnalysisError> {
    let flags = MissingnessFlags::compute(df, covariates, outcome)?;
    with_columns(
        df,
        vec![
            (
                names.covariates.clone(),
                flags.covariates.into_iter().map(Some).collect(),
            ),
            (
                names.outcome.clone(),
                flags.outcome.into_iter().map(Some).collect(),
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let df = df!(
            "age" => &[Some(30.0), None, Some(40.0), Some(50.0)],
            "income" => &[Some(1.0), Some(2.0), Some(f64::NAN), Some(4.0)],
            "outcome" => &[None, Some(1.0), Some(2.0), Some(3.0)]
        )
        .unwrap();
        let covs = vec!["age".to_string(), "income".to_string()];
        let out = add_missingness_flags(&df, &covs, "outcome", &FlagNames::default()).unwrap();

        assert_eq!(
            numeric_column(&out, "missing_covariates").unwrap(),
            vec![Some(0.0), Some(1.0), Some(1.0), Some(0.0)]
        );
        assert_eq!(
            numeric_column(&out, "missing_outcome").unwrap(),
            vec![Some(1.0), Some(0.0), Some(0.0), Some(0.0)]
        );
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_flags_unknown_column() {
        let df = df!("a" => &[1.0]).unwrap();
        let covs = vec!["b".to_string()];
        assert!(matches!(
            MissingnessFlags::compute(&df, &covs, "a"),
            Err(AnalysisError::ColumnNotFound(_))
        ));
    }
}
