use std::fmt::Debug;

/// Trait for distance metrics used in nearest-neighbor imputation.
///
/// Rows may have missing coordinates; a metric returns `None` when two rows
/// share no observed coordinate and cannot be compared.
pub trait DistanceMetric: Send + Sync + Debug {
    /// Calculates the distance between two rows.
    fn distance(&self, a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64>;
}

/// Euclidean distance over the jointly observed coordinates, rescaled to the
/// full dimension: `sqrt(p / m * sum of squared differences)` where `m` of the
/// `p` coordinates are observed in both rows.
///
/// The squared sum is evaluated in expanded form, `|a|² + |b|² - 2 a·b` with
/// missing coordinates zeroed, minus the squares that only one row observes.
/// Rows at the same exact distance can therefore differ in the last bits,
/// which settles near ties the same way the reference imputer does.
#[derive(Debug, Clone, Default)]
pub struct NanEuclidean;

impl DistanceMetric for NanEuclidean {
    fn distance(&self, a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
        let p = a.len();
        let shared = a
            .iter()
            .zip(b.iter())
            .filter(|(x, y)| x.is_some() && y.is_some())
            .count();
        if shared == 0 {
            return None;
        }
        let zeroed = |v: &Option<f64>| v.unwrap_or(0.0);
        let aa: f64 = a.iter().map(|x| zeroed(x) * zeroed(x)).sum();
        let bb: f64 = b.iter().map(|y| zeroed(y) * zeroed(y)).sum();
        let ab: f64 = a.iter().zip(b.iter()).map(|(x, y)| zeroed(x) * zeroed(y)).sum();

        let mut d = -2.0 * ab;
        d += aa;
        d += bb;
        d = d.max(0.0);
        // Remove the squares of coordinates missing on the other side.
        let only_a: f64 = a
            .iter()
            .zip(b.iter())
            .filter(|(_, y)| y.is_none())
            .map(|(x, _)| zeroed(x) * zeroed(x))
            .sum();
        let only_b: f64 = a
            .iter()
            .zip(b.iter())
            .filter(|(x, _)| x.is_none())
            .map(|(_, y)| zeroed(y) * zeroed(y))
            .sum();
        d -= only_a;
        d -= only_b;
        d = d.max(0.0);
        Some((d / shared as f64 * p as f64).sqrt())
    }
}
