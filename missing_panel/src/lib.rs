//! Missing-data diagnostics and treatment-stratified imputation for panel
//! surveys with a randomized treatment.
//!
//! The library answers two questions about a cleaned survey panel: is the
//! missingness random with respect to treatment and covariates, and how do
//! treatment-effect estimates move under different imputation strategies?
//!
//! It provides:
//!
//! - missingness indicators ([`add_missingness_flags`]),
//! - quartile and median indicator blocks ([`discretize`]),
//! - two-group comparisons by a binary column: t-tests, median-centered
//!   Levene tests and chi-square tests ([`compare_by_group`]),
//! - OLS with robust standard errors and logit coefficient tables
//!   ([`fit_and_summarize`]),
//! - imputation within treatment arms by kNN, stochastic median, or column
//!   maximum/minimum ([`StratifiedImputer`]),
//! - a batch that runs the whole diagnostic ([`MissingnessReport`]).
//!
//! # Example
//!
//! ```ignore
//! use polars::prelude::*;
//! use missing_panel::{AnalysisConfig, ImputedVariant, MissingnessReport, StratifiedImputer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let df = df!(
//!         "treatment" => &[1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
//!         "age" => &[Some(31.0), None, Some(45.0), Some(38.0), Some(29.0), Some(52.0), None, Some(41.0)],
//!         "income" => &[Some(12.0), Some(18.0), None, Some(15.0), Some(11.0), None, Some(14.0), Some(9.0)]
//!     )?;
//!
//!     let config = AnalysisConfig {
//!         outcome: "income".to_string(),
//!         covariates: vec!["age".to_string()],
//!         ..AnalysisConfig::default()
//!     };
//!
//!     let report = MissingnessReport::run(&df, &config)?;
//!     report.summary();
//!
//!     let imputer = StratifiedImputer::from_config(df, &config);
//!     let complete = imputer.impute_variant(ImputedVariant::KnnMax, &config.covariates, "income")?;
//!     println!("{}", complete);
//!     Ok(())
//! }
//! ```

use polars::prelude::PolarsError;
use thiserror::Error;

pub mod comparison;
pub mod config;
pub mod dataset;
pub mod discretize;
pub mod imputation;
pub mod inference;
pub mod math;
pub mod missingness;
pub mod regression;
pub mod report;

pub use crate::comparison::{compare_by_group, compare_columns, ComparisonTable, StatisticKind};
pub use crate::config::{AnalysisConfig, FlagNames, StochasticParams};
pub use crate::discretize::{discretize, replace_with_indicators, QuantileMode};
pub use crate::imputation::engine::{ImputationStrategy, ImputedVariant, StratifiedImputer};
pub use crate::inference::Significance;
pub use crate::missingness::{add_missingness_flags, MissingnessFlags};
pub use crate::regression::{fit_and_summarize, fit_model, ModelKind, RegressionOutput};
pub use crate::report::{impute_variants, MissingnessReport, UnitFailure};

/// Error type for the `missing_panel` library.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Wraps a `PolarsError`.
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    /// A specified column name does not exist in the DataFrame.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    /// A column exists but cannot be read as numbers.
    #[error("Column is not numeric: {0}")]
    NonNumericColumn(String),
    /// The grouping column is not strictly 0/1, or one of the groups is empty.
    #[error("Invalid grouping column '{column}': {reason}")]
    InvalidGrouping { column: String, reason: String },
    /// Too little variation or too few observations for a requested test.
    #[error("Degenerate test for column '{column}': {reason}")]
    DegenerateTest { column: String, reason: String },
    /// A model failed to converge, or its design is rank-deficient.
    #[error("Model convergence error: {0}")]
    ModelConvergence(String),
    /// An imputation left missing values in a target column.
    #[error("Imputation left {remaining} missing value(s) in column '{column}'")]
    IncompleteImputation { column: String, remaining: usize },
    /// The analysis configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
