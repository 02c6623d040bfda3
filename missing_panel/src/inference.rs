//! This module contains functions for statistical inference: reference
//! distribution tail probabilities and significance annotation.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

/// Two-sided p-value of a t statistic with `df` degrees of freedom.
pub fn t_two_sided(t: f64, df: f64) -> Option<f64> {
    if !t.is_finite() || !(df > 0.0) {
        return None;
    }
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some(clamp_probability(2.0 * dist.sf(t.abs())))
}

/// Upper-tail p-value of an F statistic.
pub fn f_upper(f: f64, d1: f64, d2: f64) -> Option<f64> {
    if !f.is_finite() || f < 0.0 || !(d1 > 0.0) || !(d2 > 0.0) {
        return None;
    }
    let dist = FisherSnedecor::new(d1, d2).ok()?;
    Some(clamp_probability(dist.sf(f)))
}

/// Upper-tail p-value of a chi-square statistic.
pub fn chi2_upper(x: f64, df: f64) -> Option<f64> {
    if !x.is_finite() || x < 0.0 || !(df > 0.0) {
        return None;
    }
    let dist = ChiSquared::new(df).ok()?;
    Some(clamp_probability(dist.sf(x)))
}

/// Two-sided p-value of a standard normal z statistic.
pub fn normal_two_sided(z: f64) -> Option<f64> {
    if !z.is_finite() {
        return None;
    }
    let dist = Normal::new(0.0, 1.0).ok()?;
    Some(clamp_probability(2.0 * dist.sf(z.abs())))
}

fn clamp_probability(p: f64) -> f64 {
    p.clamp(0.0, 1.0)
}

/// Significance level of a p-value after a Bonferroni correction.
///
/// The thresholds 0.10, 0.05 and 0.01 are divided by `correction`, the number
/// of hypotheses tested simultaneously (1 means no correction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Significance {
    None,
    Ten,
    Five,
    One,
}

impl Significance {
    pub fn from_p_value(p_value: Option<f64>, correction: u32) -> Self {
        let Some(p) = p_value else {
            return Significance::None;
        };
        let correction = f64::from(correction.max(1));
        if p <= 0.01 / correction {
            Significance::One
        } else if p <= 0.05 / correction {
            Significance::Five
        } else if p <= 0.10 / correction {
            Significance::Ten
        } else {
            Significance::None
        }
    }

    pub fn stars(&self) -> &'static str {
        match self {
            Significance::None => "",
            Significance::Ten => "*",
            Significance::Five => "**",
            Significance::One => "***",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_t_two_sided_is_symmetric() {
        let p_pos = t_two_sided(2.0, 10.0).unwrap();
        let p_neg = t_two_sided(-2.0, 10.0).unwrap();
        assert!((p_pos - p_neg).abs() < 1e-12);
        assert!((t_two_sided(0.0, 5.0).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normal_two_sided_at_196() {
        let p = normal_two_sided(1.959964).unwrap();
        assert!((p - 0.05).abs() < 1e-5);
    }

    #[test]
    fn test_chi2_upper_matches_normal_square() {
        // A chi-square with one degree of freedom is a squared standard normal.
        let p = chi2_upper(1.959964_f64.powi(2), 1.0).unwrap();
        assert!((p - 0.05).abs() < 1e-5);
    }

    #[test]
    fn test_undefined_inputs() {
        assert_eq!(t_two_sided(f64::NAN, 3.0), None);
        assert_eq!(t_two_sided(1.0, 0.0), None);
        assert_eq!(f_upper(-1.0, 1.0, 3.0), None);
    }

    #[test]
    fn test_bonferroni_significance() {
        assert_eq!(Significance::from_p_value(Some(0.04), 1), Significance::Five);
        assert_eq!(Significance::from_p_value(Some(0.04), 10), Significance::None);
        assert_eq!(Significance::from_p_value(Some(0.0009), 10), Significance::One);
        assert_eq!(Significance::from_p_value(Some(0.004), 10), Significance::Five);
        assert_eq!(Significance::from_p_value(None, 1), Significance::None);
        assert_eq!(Significance::One.stars(), "***");
    }
}
