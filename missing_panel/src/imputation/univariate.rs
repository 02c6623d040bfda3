//! Single-column fills: stochastic median, column maximum, column minimum.
//!
//! Each fill only looks at the observed values of the column it fills. A
//! column without observed values is returned unchanged.

use crate::config::StochasticParams;
use crate::math::descriptive::{max, median, min, observed, std_dev};
use crate::AnalysisError;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

fn fill_with(values: &[Option<f64>], mut next: impl FnMut() -> f64) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| match v {
            Some(x) => Some(*x),
            None => Some(next()),
        })
        .collect()
}

/// Fills every missing entry with the column's observed maximum.
pub fn fill_column_max(values: &[Option<f64>]) -> Vec<Option<f64>> {
    match max(&observed(values)) {
        Some(m) => fill_with(values, || m),
        None => values.to_vec(),
    }
}

/// Fills every missing entry with the column's observed minimum.
pub fn fill_column_min(values: &[Option<f64>]) -> Vec<Option<f64>> {
    match min(&observed(values)) {
        Some(m) => fill_with(values, || m),
        None => values.to_vec(),
    }
}

/// Fills missing entries with draws from
/// `Normal(median, sd_share * sd + sd_fixed)`, where `sd` is the population
/// standard deviation of the observed values. Each filled cell is the mean of
/// `params.draws` draws. Cells are filled in row order from `rng`.
pub fn fill_stochastic_median(
    values: &[Option<f64>],
    params: &StochasticParams,
    rng: &mut StdRng,
) -> Result<Vec<Option<f64>>, AnalysisError> {
    let obs = observed(values);
    let (Some(center), Some(sd)) = (median(&obs), std_dev(&obs, 0)) else {
        return Ok(values.to_vec());
    };
    let spread = params.sd_share * sd + params.sd_fixed;
    let normal = Normal::new(center, spread).map_err(|e| {
        AnalysisError::InvalidConfig(format!("invalid draw distribution: {}", e))
    })?;
    let draws = params.draws.max(1);
    Ok(fill_with(values, || {
        (0..draws).map(|_| normal.sample(rng)).sum::<f64>() / draws as f64
    }))
}
