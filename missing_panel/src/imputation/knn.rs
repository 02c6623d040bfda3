//! Nearest-neighbor imputation on standardized columns.

use super::distance::{DistanceMetric, NanEuclidean};
use crate::math::descriptive::{mean, observed, std_dev};
use rayon::prelude::*;

/// Standardization fitted on the observed values of one column.
#[derive(Debug, Clone, Copy)]
struct Scaler {
    mean: f64,
    scale: f64,
}

impl Scaler {
    fn fit(values: &[Option<f64>]) -> Option<Self> {
        let obs = observed(values);
        let mean = mean(&obs)?;
        let sd = std_dev(&obs, 0)?;
        Some(Self {
            mean,
            scale: if sd > 0.0 { sd } else { 1.0 },
        })
    }

    fn transform(&self, x: f64) -> f64 {
        (x - self.mean) / self.scale
    }

    fn inverse(&self, z: f64) -> f64 {
        z * self.scale + self.mean
    }
}

/// k-nearest-neighbor imputer with uniform weights.
///
/// Columns are standardized with their own observed mean and population
/// standard deviation before distances are computed, and filled values are
/// mapped back to the original scale. For each missing cell the donors are the
/// rows observing that column; the `k` closest donors (ties broken by lower row
/// position) are averaged. A row that shares no observed coordinate with any
/// donor gets the donors' mean. The procedure is deterministic.
#[derive(Debug, Clone)]
pub struct KnnImputer<M: DistanceMetric = NanEuclidean> {
    k: usize,
    metric: M,
}

impl KnnImputer<NanEuclidean> {
    pub fn new(k: usize) -> Self {
        Self::with_metric(k, NanEuclidean)
    }
}

impl<M: DistanceMetric> KnnImputer<M> {
    pub fn with_metric(k: usize, metric: M) -> Self {
        Self {
            k: k.max(1),
            metric,
        }
    }

    /// Imputes the missing cells of a block of equally long columns.
    ///
    /// Observed cells are returned unchanged. A column without any observed
    /// value stays missing.
    pub fn impute(&self, columns: &[Vec<Option<f64>>]) -> Vec<Vec<Option<f64>>> {
        let p = columns.len();
        let n = columns.first().map_or(0, Vec::len);
        let scalers: Vec<Option<Scaler>> = columns.iter().map(|c| Scaler::fit(c)).collect();

        // Row-major standardized values.
        let z: Vec<Vec<Option<f64>>> = (0..n)
            .map(|i| {
                (0..p)
                    .map(|j| {
                        let scaler = scalers[j]?;
                        columns[j][i].map(|x| scaler.transform(x))
                    })
                    .collect()
            })
            .collect();
        let donors: Vec<Vec<usize>> = (0..p)
            .map(|j| (0..n).filter(|&i| z[i][j].is_some()).collect())
            .collect();

        let fills: Vec<Vec<(usize, f64)>> = (0..n)
            .into_par_iter()
            .map(|i| self.fill_row(i, &z, &donors, &scalers))
            .collect();

        let mut out = columns.to_vec();
        for (i, row_fills) in fills.into_iter().enumerate() {
            for (j, value) in row_fills {
                out[j][i] = Some(value);
            }
        }
        out
    }

    /// Values for the missing cells of row `i`, as `(column, value)` pairs on
    /// the original scale.
    fn fill_row(
        &self,
        i: usize,
        z: &[Vec<Option<f64>>],
        donors: &[Vec<usize>],
        scalers: &[Option<Scaler>],
    ) -> Vec<(usize, f64)> {
        let row = &z[i];
        if row.iter().all(Option::is_some) {
            return Vec::new();
        }
        let distances: Vec<Option<f64>> = z
            .iter()
            .enumerate()
            .map(|(d, other)| {
                if d == i {
                    None
                } else {
                    self.metric.distance(row, other)
                }
            })
            .collect();

        let mut fills = Vec::new();
        for (j, cell) in row.iter().enumerate() {
            if cell.is_some() {
                continue;
            }
            let (Some(scaler), false) = (scalers[j], donors[j].is_empty()) else {
                continue;
            };
            let mut ranked: Vec<(f64, usize)> = donors[j]
                .iter()
                .filter_map(|&d| distances[d].map(|dist| (dist, d)))
                .collect();
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let chosen: Vec<usize> = if ranked.is_empty() {
                donors[j].clone()
            } else {
                ranked.iter().take(self.k).map(|&(_, d)| d).collect()
            };
            let z_mean = chosen
                .iter()
                .map(|&d| z[d][j].unwrap_or(0.0))
                .sum::<f64>()
                / chosen.len() as f64;
            fills.push((j, scaler.inverse(z_mean)));
        }
        fills
    }
}
