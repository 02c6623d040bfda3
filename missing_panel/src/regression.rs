//! Coefficient tables for linear and logistic models.
//!
//! The design matrix always starts with an intercept column labelled
//! `constant`, followed by the regressors in the order they were given. Rows
//! with a missing value in the response or any regressor are dropped before
//! fitting (listwise deletion); nothing is imputed here.

use crate::comparison::fmt_cell;
use crate::dataset::{column_names, numeric_column, numeric_columns};
use crate::inference::{normal_two_sided, t_two_sided, Significance};
use crate::math::logit::logit;
use crate::math::ols::ols;
use crate::AnalysisError;
use comfy_table::{Cell, Table};
use getset::Getters;
use nalgebra::{DMatrix, DVector};
use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

pub const CONSTANT: &str = "constant";

const LOGIT_MAX_ITER: usize = 100;
const LOGIT_TOL: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelKind {
    /// OLS with HC1 robust standard errors.
    Linear,
    /// Maximum-likelihood binary logit.
    Logit,
}

#[derive(Debug, Clone, Getters, Serialize)]
#[getset(get = "pub")]
pub struct CoefficientRow {
    name: String,
    coefficient: f64,
    std_error: f64,
    p_value: Option<f64>,
}

/// Fit statistics reported for linear models.
#[derive(Debug, Clone, Getters, Serialize)]
#[getset(get = "pub")]
pub struct FitSummary {
    observations: usize,
    r_squared: f64,
    adj_r_squared: f64,
    /// Classical F of the model against the intercept-only model.
    f_statistic: Option<f64>,
}

#[derive(Debug, Clone, Getters, Serialize)]
#[getset(get = "pub")]
pub struct RegressionOutput {
    response: String,
    kind: ModelKind,
    coefficients: Vec<CoefficientRow>,
    /// Rows used in the fit after listwise deletion.
    n_obs: usize,
    fit: Option<FitSummary>,
}

impl RegressionOutput {
    pub fn coefficient(&self, name: &str) -> Option<&CoefficientRow> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Coefficient table as a frame, rows in canonical order.
    pub fn to_dataframe(&self) -> Result<DataFrame, AnalysisError> {
        let names: Vec<String> = self.coefficients.iter().map(|c| c.name.clone()).collect();
        let coef: Vec<f64> = self.coefficients.iter().map(|c| c.coefficient).collect();
        let se: Vec<f64> = self.coefficients.iter().map(|c| c.std_error).collect();
        let p: Vec<Option<f64>> = self.coefficients.iter().map(|c| c.p_value).collect();
        Ok(DataFrame::new(vec![
            Column::new("variable".into(), names),
            Column::new("coefficient".into(), coef),
            Column::new("std_error".into(), se),
            Column::new("p_value".into(), p),
        ])?)
    }

    pub fn summary_table(&self, bonferroni: u32) -> Table {
        let mut table = Table::new();
        table.set_header(vec!["Variable", "Coefficient", "Std. Err.", "p-value", ""]);
        for row in &self.coefficients {
            table.add_row(vec![
                Cell::new(&row.name),
                Cell::new(format!("{:.4}", row.coefficient)),
                Cell::new(format!("{:.4}", row.std_error)),
                Cell::new(fmt_cell(row.p_value)),
                Cell::new(Significance::from_p_value(row.p_value, bonferroni).stars()),
            ]);
        }
        if let Some(fit) = &self.fit {
            table.add_row(vec![
                Cell::new("Observations"),
                Cell::new(fit.observations),
            ]);
            table.add_row(vec![
                Cell::new("R-squared"),
                Cell::new(format!("{:.4}", fit.r_squared)),
            ]);
            table.add_row(vec![
                Cell::new("Adj. R-squared"),
                Cell::new(format!("{:.4}", fit.adj_r_squared)),
            ]);
            table.add_row(vec![
                Cell::new("F statistic"),
                Cell::new(fmt_cell(fit.f_statistic)),
            ]);
        } else {
            table.add_row(vec![Cell::new("Observations"), Cell::new(self.n_obs)]);
        }
        table
    }

    pub fn summary(&self, bonferroni: u32) {
        let model = match self.kind {
            ModelKind::Linear => "OLS (robust SE)",
            ModelKind::Logit => "Logit",
        };
        println!("{} of {}", model, self.response);
        println!("{}", self.summary_table(bonferroni));
    }
}

/// Regresses `response` on every other column of `df`.
pub fn fit_and_summarize(
    df: &DataFrame,
    response: &str,
    kind: ModelKind,
) -> Result<RegressionOutput, AnalysisError> {
    let regressors: Vec<String> = column_names(df)
        .into_iter()
        .filter(|c| c != response)
        .collect();
    fit_model(df, response, &regressors, kind)
}

/// Regresses `response` on the listed regressors.
pub fn fit_model(
    df: &DataFrame,
    response: &str,
    regressors: &[String],
    kind: ModelKind,
) -> Result<RegressionOutput, AnalysisError> {
    let y_all = numeric_column(df, response)?;
    let x_all = numeric_columns(df, regressors)?;

    let complete: Vec<usize> = (0..df.height())
        .filter(|&i| y_all[i].is_some() && x_all.iter().all(|c| c[i].is_some()))
        .collect();
    let n = complete.len();
    let k = regressors.len() + 1;
    debug!(
        response,
        rows = df.height(),
        complete = n,
        parameters = k,
        "fitting {:?} model",
        kind
    );

    let y = DVector::from_iterator(n, complete.iter().map(|&i| y_all[i].unwrap_or(f64::NAN)));
    let x = DMatrix::from_fn(n, k, |r, c| {
        if c == 0 {
            1.0
        } else {
            x_all[c - 1][complete[r]].unwrap_or(f64::NAN)
        }
    });

    let names = std::iter::once(CONSTANT.to_string()).chain(regressors.iter().cloned());

    match kind {
        ModelKind::Linear => {
            let fit = ols(&y, &x)?;
            let se = fit.robust_std_errors();
            let df_resid = fit.df_resid();
            let coefficients = names
                .enumerate()
                .map(|(j, name)| CoefficientRow {
                    name,
                    coefficient: fit.coefficients[j],
                    std_error: se[j],
                    p_value: t_two_sided(fit.coefficients[j] / se[j], df_resid),
                })
                .collect();
            Ok(RegressionOutput {
                response: response.to_string(),
                kind,
                coefficients,
                n_obs: n,
                fit: Some(FitSummary {
                    observations: n,
                    r_squared: fit.r_squared,
                    adj_r_squared: fit.adj_r_squared,
                    f_statistic: fit.f_statistic(),
                }),
            })
        }
        ModelKind::Logit => {
            let fit = logit(&y, &x, LOGIT_MAX_ITER, LOGIT_TOL)?;
            let se = fit.std_errors();
            let coefficients = names
                .enumerate()
                .map(|(j, name)| CoefficientRow {
                    name,
                    coefficient: fit.coefficients[j],
                    std_error: se[j],
                    p_value: normal_two_sided(fit.coefficients[j] / se[j]),
                })
                .collect();
            Ok(RegressionOutput {
                response: response.to_string(),
                kind,
                coefficients,
                n_obs: n,
                fit: None,
            })
        }
    }
}
