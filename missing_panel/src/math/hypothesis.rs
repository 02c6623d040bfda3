//! Two-group hypothesis tests used by the comparison engine.
//!
//! Every test returns `Err(reason)` instead of a fabricated value when the data
//! cannot support it (too few observations, no spread, a single category).

use crate::inference::{chi2_upper, f_upper, t_two_sided};
use crate::math::descriptive::{mean, median, variance};

/// Outcome of a single test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
    pub df: f64,
}

/// Two-sample t-test of equal means, `group0 - group1`.
///
/// With `equal_var` the pooled-variance Student test is used, otherwise
/// Welch's test with Satterthwaite degrees of freedom.
pub fn two_sample_t(group0: &[f64], group1: &[f64], equal_var: bool) -> Result<TestOutcome, String> {
    let (n0, n1) = (group0.len(), group1.len());
    if n0 < 2 || n1 < 2 {
        return Err(format!(
            "t-test needs at least two observations per group (got {} and {})",
            n0, n1
        ));
    }
    let (m0, m1) = (mean(group0).unwrap_or(f64::NAN), mean(group1).unwrap_or(f64::NAN));
    let v0 = variance(group0, 1).unwrap_or(f64::NAN);
    let v1 = variance(group1, 1).unwrap_or(f64::NAN);
    let (n0, n1) = (n0 as f64, n1 as f64);

    let (se, df) = if equal_var {
        let df = n0 + n1 - 2.0;
        let pooled = ((n0 - 1.0) * v0 + (n1 - 1.0) * v1) / df;
        ((pooled * (1.0 / n0 + 1.0 / n1)).sqrt(), df)
    } else {
        let a = v0 / n0;
        let b = v1 / n1;
        let df = (a + b).powi(2) / (a.powi(2) / (n0 - 1.0) + b.powi(2) / (n1 - 1.0));
        ((a + b).sqrt(), df)
    };

    if !(se > 0.0) || !se.is_finite() {
        return Err("standard error of the mean difference is zero".to_string());
    }
    let t = (m0 - m1) / se;
    let p_value = t_two_sided(t, df).ok_or_else(|| "t distribution is undefined".to_string())?;
    Ok(TestOutcome {
        statistic: t,
        p_value,
        df,
    })
}

/// Levene's test of equal variances, centered on group medians
/// (the Brown-Forsythe variant).
pub fn levene_median(group0: &[f64], group1: &[f64]) -> Result<TestOutcome, String> {
    if group0.len() < 2 || group1.len() < 2 {
        return Err(format!(
            "Levene's test needs at least two observations per group (got {} and {})",
            group0.len(),
            group1.len()
        ));
    }
    let deviations = |g: &[f64]| -> Vec<f64> {
        let m = median(g).unwrap_or(f64::NAN);
        g.iter().map(|x| (x - m).abs()).collect()
    };
    let z0 = deviations(group0);
    let z1 = deviations(group1);
    let (n0, n1) = (z0.len() as f64, z1.len() as f64);
    let n = n0 + n1;
    let zbar0 = mean(&z0).unwrap_or(f64::NAN);
    let zbar1 = mean(&z1).unwrap_or(f64::NAN);
    let zbar = (zbar0 * n0 + zbar1 * n1) / n;

    let between = n0 * (zbar0 - zbar).powi(2) + n1 * (zbar1 - zbar).powi(2);
    let within = z0.iter().map(|z| (z - zbar0).powi(2)).sum::<f64>()
        + z1.iter().map(|z| (z - zbar1).powi(2)).sum::<f64>();
    if !(within > 0.0) {
        return Err("absolute deviations have no within-group spread".to_string());
    }

    let df_within = n - 2.0;
    let w = df_within * between / within;
    let p_value = f_upper(w, 1.0, df_within).ok_or_else(|| "F distribution is undefined".to_string())?;
    Ok(TestOutcome {
        statistic: w,
        p_value,
        df: df_within,
    })
}

/// Chi-square test of independence on an `r x c` table of observed counts.
///
/// Yates' continuity correction is applied when the table has a single degree
/// of freedom.
pub fn chi_square_independence(table: &[Vec<f64>]) -> Result<TestOutcome, String> {
    let rows = table.len();
    let cols = table.first().map_or(0, Vec::len);
    if rows < 2 || cols < 2 {
        return Err(format!(
            "contingency table is {}x{}; at least two observed categories per margin are needed",
            rows, cols
        ));
    }
    let row_totals: Vec<f64> = table.iter().map(|r| r.iter().sum()).collect();
    let col_totals: Vec<f64> = (0..cols)
        .map(|j| table.iter().map(|r| r[j]).sum())
        .collect();
    let total: f64 = row_totals.iter().sum();
    if row_totals.iter().chain(col_totals.iter()).any(|&t| t <= 0.0) {
        return Err("contingency table has an empty margin".to_string());
    }

    let df = ((rows - 1) * (cols - 1)) as f64;
    let yates = df == 1.0;
    let mut statistic = 0.0;
    for (i, row) in table.iter().enumerate() {
        for (j, &observed) in row.iter().enumerate() {
            let expected = row_totals[i] * col_totals[j] / total;
            let mut diff = (observed - expected).abs();
            if yates {
                diff -= diff.min(0.5);
            }
            statistic += diff * diff / expected;
        }
    }
    let p_value = chi2_upper(statistic, df).ok_or_else(|| "chi-square distribution is undefined".to_string())?;
    Ok(TestOutcome {
        statistic,
        p_value,
        df,
    })
}
