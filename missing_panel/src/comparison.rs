//! Column-wise two-group comparisons.
//!
//! [`compare_by_group`] splits a frame by a binary column and runs one test per
//! remaining numeric column. A column that cannot support the requested test
//! (too few observations, no spread, a single category) produces a row with
//! undefined statistic and p-value; the other columns are still computed.

use crate::dataset::{numeric_column, numeric_column_names, split_binary, take, BinarySplit};
use crate::inference::Significance;
use crate::math::descriptive::{mean, observed};
use crate::math::hypothesis::{chi_square_independence, levene_median, two_sample_t, TestOutcome};
use crate::AnalysisError;
use comfy_table::{Cell, Table};
use getset::Getters;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

/// Which two-group procedure to run on each column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatisticKind {
    /// Two-sample t-test; `equal_var` selects the pooled test over Welch's.
    MeanTest { equal_var: bool },
    /// Median-centered Levene (Brown-Forsythe) test.
    VarianceTest,
    /// Chi-square test of independence on the observed categories.
    AssociationTest,
}

impl StatisticKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatisticKind::MeanTest { equal_var: true } => "t-test (pooled)",
            StatisticKind::MeanTest { equal_var: false } => "t-test (Welch)",
            StatisticKind::VarianceTest => "Levene (median)",
            StatisticKind::AssociationTest => "chi-square",
        }
    }
}

/// The comparison of one column between the two groups.
#[derive(Debug, Clone, Getters, Serialize)]
#[getset(get = "pub")]
pub struct ComparisonRow {
    column: String,
    /// Mean of the observed values in group 0.
    group0_mean: Option<f64>,
    group1_mean: Option<f64>,
    /// Number of observed values in group 0.
    group0_n: usize,
    group1_n: usize,
    statistic: Option<f64>,
    p_value: Option<f64>,
    /// Set when the test could not be computed.
    undefined_reason: Option<String>,
}

impl ComparisonRow {
    fn undefined(column: &str, reason: String) -> Self {
        ComparisonRow {
            column: column.to_string(),
            group0_mean: None,
            group1_mean: None,
            group0_n: 0,
            group1_n: 0,
            statistic: None,
            p_value: None,
            undefined_reason: Some(reason),
        }
    }

    pub fn significance(&self, bonferroni: u32) -> Significance {
        Significance::from_p_value(self.p_value, bonferroni)
    }
}

/// One comparison table: a grouping column, a procedure and a row per column.
#[derive(Debug, Clone, Getters, Serialize)]
#[getset(get = "pub")]
pub struct ComparisonTable {
    grouping: String,
    kind: StatisticKind,
    rows: Vec<ComparisonRow>,
    /// Rows with grouping value 0.
    group0_size: usize,
    /// Rows with grouping value 1.
    group1_size: usize,
}

impl ComparisonTable {
    /// Finds the row for a compared column.
    pub fn row(&self, column: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.column == column)
    }

    /// Converts the table into a frame with one row per compared column and a
    /// trailing `sample_size` row holding the group sizes.
    pub fn to_dataframe(&self) -> Result<DataFrame, AnalysisError> {
        let mut names: Vec<String> = self.rows.iter().map(|r| r.column.clone()).collect();
        let mut g0: Vec<Option<f64>> = self.rows.iter().map(|r| r.group0_mean).collect();
        let mut g1: Vec<Option<f64>> = self.rows.iter().map(|r| r.group1_mean).collect();
        let mut stat: Vec<Option<f64>> = self.rows.iter().map(|r| r.statistic).collect();
        let mut p: Vec<Option<f64>> = self.rows.iter().map(|r| r.p_value).collect();

        names.push("sample_size".to_string());
        g0.push(Some(self.group0_size as f64));
        g1.push(Some(self.group1_size as f64));
        stat.push(None);
        p.push(None);

        let df = DataFrame::new(vec![
            Column::new("column".into(), names),
            Column::new("group0".into(), g0),
            Column::new("group1".into(), g1),
            Column::new("statistic".into(), stat),
            Column::new("p_value".into(), p),
        ])?;
        Ok(df)
    }

    pub fn summary_table(&self, bonferroni: u32) -> Table {
        let mut table = Table::new();
        table.set_header(vec!["Variable", "Group 0", "Group 1", "Statistic", "p-value", ""]);
        for row in &self.rows {
            table.add_row(vec![
                Cell::new(&row.column),
                Cell::new(fmt_cell(row.group0_mean)),
                Cell::new(fmt_cell(row.group1_mean)),
                Cell::new(fmt_cell(row.statistic)),
                Cell::new(fmt_cell(row.p_value)),
                Cell::new(row.significance(bonferroni).stars()),
            ]);
        }
        table.add_row(vec![
            Cell::new("sample_size"),
            Cell::new(self.group0_size),
            Cell::new(self.group1_size),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
        ]);
        table
    }

    /// Prints the table to the console.
    pub fn summary(&self, bonferroni: u32) {
        println!("{} by {}", self.kind.label(), self.grouping);
        println!("{}", self.summary_table(bonferroni));
    }
}

pub(crate) fn fmt_cell(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.4}", v),
        _ => "NA".to_string(),
    }
}

/// Builds the 2 x k table of counts between group membership and the observed
/// categories of a column. Categories are the distinct observed values in
/// ascending order.
pub fn contingency_table(group0: &[f64], group1: &[f64]) -> Vec<Vec<f64>> {
    let mut categories: Vec<f64> = group0.iter().chain(group1.iter()).copied().collect();
    categories.sort_by(|a, b| a.total_cmp(b));
    categories.dedup();
    let count = |group: &[f64]| -> Vec<f64> {
        categories
            .iter()
            .map(|c| group.iter().filter(|&&v| v == *c).count() as f64)
            .collect()
    };
    vec![count(group0), count(group1)]
}

fn compare_column(
    column: &str,
    values: &[Option<f64>],
    split: &BinarySplit,
    kind: StatisticKind,
) -> ComparisonRow {
    let g0 = observed(&take(values, &split.group0));
    let g1 = observed(&take(values, &split.group1));

    let outcome: Result<TestOutcome, String> = match kind {
        StatisticKind::MeanTest { equal_var } => two_sample_t(&g0, &g1, equal_var),
        StatisticKind::VarianceTest => levene_median(&g0, &g1),
        StatisticKind::AssociationTest => chi_square_independence(&contingency_table(&g0, &g1)),
    };

    let (statistic, p_value, undefined_reason) = match outcome {
        Ok(test) => (Some(test.statistic), Some(test.p_value), None),
        Err(reason) => {
            let err = AnalysisError::DegenerateTest {
                column: column.to_string(),
                reason: reason.clone(),
            };
            warn!(error = %err, "test left undefined");
            (None, None, Some(reason))
        }
    };

    ComparisonRow {
        column: column.to_string(),
        group0_mean: mean(&g0),
        group1_mean: mean(&g1),
        group0_n: g0.len(),
        group1_n: g1.len(),
        statistic,
        p_value,
        undefined_reason,
    }
}

/// Compares every numeric column except `grouping` between the two groups.
pub fn compare_by_group(
    df: &DataFrame,
    grouping: &str,
    kind: StatisticKind,
) -> Result<ComparisonTable, AnalysisError> {
    let columns = numeric_column_names(df, &[grouping.to_string()]);
    compare_columns(df, grouping, &columns, kind)
}

/// Compares the listed columns between the two groups of `grouping`.
///
/// The grouping column is never compared with itself, even when listed. A
/// listed column that is not numeric yields an undefined row; a listed column
/// that does not exist is an error.
pub fn compare_columns(
    df: &DataFrame,
    grouping: &str,
    columns: &[String],
    kind: StatisticKind,
) -> Result<ComparisonTable, AnalysisError> {
    let groups = numeric_column(df, grouping)?;
    let split = split_binary(&groups, grouping)?;
    debug!(
        grouping,
        kind = kind.label(),
        group0 = split.group0.len(),
        group1 = split.group1.len(),
        columns = columns.len(),
        "comparing columns"
    );

    let rows = columns
        .par_iter()
        .filter(|c| c.as_str() != grouping)
        .map(|c| match numeric_column(df, c) {
            Ok(values) => Ok(compare_column(c, &values, &split, kind)),
            Err(err @ AnalysisError::NonNumericColumn(_)) => {
                warn!(error = %err, "test left undefined");
                Ok(ComparisonRow::undefined(c, err.to_string()))
            }
            Err(err) => Err(err),
        })
        .collect::<Result<Vec<_>, AnalysisError>>()?;

    Ok(ComparisonTable {
        grouping: grouping.to_string(),
        kind,
        rows,
        group0_size: split.group0.len(),
        group1_size: split.group1.len(),
    })
}
