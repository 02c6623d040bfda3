use crate::AnalysisError;
use nalgebra::{DMatrix, DVector};

/// Represents the results of an OLS regression.
#[derive(Debug)]
pub struct OlsResult {
    pub coefficients: DVector<f64>,
    /// Classical variance-covariance matrix, `σ²(X'X)⁻¹`.
    pub vcov: DMatrix<f64>,
    /// Heteroskedasticity-robust (HC1) variance-covariance matrix.
    pub robust_vcov: DMatrix<f64>,
    pub residuals: DVector<f64>,
    pub n_obs: usize,
    /// Total sum of squares around the mean of `y`.
    pub tss: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
}

impl OlsResult {
    /// Residual degrees of freedom, `n - k`.
    pub fn df_resid(&self) -> f64 {
        self.n_obs as f64 - self.coefficients.len() as f64
    }

    /// Robust standard errors, one per coefficient.
    pub fn robust_std_errors(&self) -> DVector<f64> {
        self.robust_vcov.diagonal().map(|v| v.max(0.0).sqrt())
    }

    /// Classical F statistic of the regression against the intercept-only
    /// model, `(ESS / (k - 1)) / (SSE / (n - k))`.
    ///
    /// Returns `None` for an intercept-only model or when the statistic is
    /// not finite (a perfect fit or a constant response).
    pub fn f_statistic(&self) -> Option<f64> {
        let k = self.coefficients.len();
        if k < 2 {
            return None;
        }
        let sse = self.residuals.norm_squared();
        let ess = self.tss - sse;
        let f = (ess / (k - 1) as f64) / (sse / self.df_resid());
        f.is_finite().then_some(f)
    }
}

/// Performs an Ordinary Least Squares (OLS) regression.
///
/// The function calculates the coefficient vector `β` using the formula:
/// `β = (X'X)⁻¹ * X'y`, together with the classical and the HC1 robust
/// covariance `n/(n-k) (X'X)⁻¹ X' diag(e²) X (X'X)⁻¹`.
///
/// # Arguments
///
/// * `y` - A `DVector` representing the outcome variable.
/// * `x` - A `DMatrix` representing the predictor variables. It is crucial that this
///   matrix includes a column of ones if an intercept is desired in the model.
///
/// # Returns
///
/// A `Result` containing the `OlsResult` on success, or a
/// `AnalysisError::ModelConvergence` if the `X'X` matrix is singular or there
/// are no residual degrees of freedom.
pub fn ols(y: &DVector<f64>, x: &DMatrix<f64>) -> Result<OlsResult, AnalysisError> {
    let n = x.nrows();
    let k = x.ncols();
    if n <= k {
        return Err(AnalysisError::ModelConvergence(format!(
            "{} complete observations are not enough to estimate {} parameters",
            n, k
        )));
    }

    let xtx = x.transpose() * x;
    let xty = x.transpose() * y;

    // X'X is positive definite unless the design is perfectly collinear.
    let scale = xtx.diagonal().max();
    let rank_deficient = || {
        AnalysisError::ModelConvergence(
            "Failed to perform Cholesky decomposition. Design matrix is rank-deficient.".to_string(),
        )
    };
    let cholesky = xtx.cholesky().ok_or_else(rank_deficient)?;
    // Rounding can leave a near-zero pivot instead of a failed factorization.
    if cholesky.l().diagonal().iter().any(|d| d * d <= 1e-12 * scale) {
        return Err(rank_deficient());
    }

    let coefficients = cholesky.solve(&xty);
    let y_hat = x * &coefficients;
    let residuals = y - y_hat;

    let n_f = n as f64;
    let k_f = k as f64;
    let sse = residuals.norm_squared();
    let sigma_squared = sse / (n_f - k_f);
    let xtx_inv = cholesky.inverse();
    let vcov = &xtx_inv * sigma_squared;

    // Meat of the sandwich: X' diag(e²) X, built by scaling the rows of X.
    let mut x_scaled = x.clone();
    for i in 0..n {
        let e = residuals[i];
        x_scaled.row_mut(i).scale_mut(e);
    }
    let meat = x_scaled.transpose() * &x_scaled;
    let robust_vcov = (&xtx_inv * meat * &xtx_inv) * (n_f / (n_f - k_f));

    let y_mean = y.mean();
    let tss = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>();
    let r_squared = if tss > 0.0 { 1.0 - sse / tss } else { f64::NAN };
    let adj_r_squared = 1.0 - (n_f - 1.0) / (n_f - k_f) * (1.0 - r_squared);

    Ok(OlsResult {
        coefficients,
        vcov,
        robust_vcov,
        residuals,
        n_obs: n,
        tss,
        r_squared,
        adj_r_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    fn simple_design() -> (DVector<f64>, DMatrix<f64>) {
        // Note: DMatrix::from_vec is column-major.
        let x = DMatrix::from_vec(
            5,
            2,
            vec![
                // Column 1: Intercept
                1.0, 1.0, 1.0, 1.0, 1.0, // Column 2: x-values
                0.0, 1.0, 2.0, 3.0, 4.0,
            ],
        );
        let y = DVector::from_vec(vec![1.0, 3.0, 4.0, 8.0, 9.0]);
        (y, x)
    }

    #[test]
    fn test_ols_simple_regression() {
        let (y, x) = simple_design();
        let result = ols(&y, &x).expect("OLS calculation failed on valid data");
        let coeffs = &result.coefficients;

        assert_eq!(coeffs.len(), 2);
        assert!((coeffs[0] - 0.8).abs() < 1e-9, "Intercept is incorrect");
        assert!((coeffs[1] - 2.1).abs() < 1e-9, "Slope is incorrect");
        assert_eq!(result.n_obs, 5);
        assert!((result.r_squared - (1.0 - 1.9 / 46.0)).abs() < 1e-9);
        assert!((result.adj_r_squared - (1.0 - 4.0 / 3.0 * 1.9 / 46.0)).abs() < 1e-9);
    }

    #[test]
    fn test_robust_covariance_hc1() {
        let (y, x) = simple_design();
        let result = ols(&y, &x).unwrap();
        // residuals 0.2, 0.1, -1.0, 0.9, -0.2; centered x -2..2, Sxx = 10
        // slope variance: sum((x - x̄)² e²) / Sxx² scaled by n/(n-k)
        let meat: f64 = 4.0 * 0.04 + 1.0 * 0.01 + 0.0 + 1.0 * 0.81 + 4.0 * 0.04;
        let expected = meat / 100.0 * (5.0 / 3.0);
        assert!((result.robust_vcov[(1, 1)] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_f_statistic_is_classical() {
        let (y, x) = simple_design();
        let result = ols(&y, &x).unwrap();
        // ESS = 46 - 1.9 = 44.1 on 1 df, SSE = 1.9 on 3 df
        let f = result.f_statistic().unwrap();
        assert!((f - 44.1 / (1.9 / 3.0)).abs() < 1e-9);

        let intercept_only = DMatrix::from_element(5, 1, 1.0);
        assert_eq!(ols(&y, &intercept_only).unwrap().f_statistic(), None);
    }

    #[test]
    fn test_ols_handles_singular_matrix() {
        // Column 2 is 2 * Column 1.
        let x = DMatrix::from_vec(4, 2, vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
        let y = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);

        match ols(&y, &x) {
            Err(AnalysisError::ModelConvergence(msg)) => {
                assert!(msg.contains("rank-deficient"));
            }
            _ => panic!("Expected a ModelConvergence error for a singular matrix."),
        }
    }

    #[test]
    fn test_ols_needs_residual_degrees_of_freedom() {
        let x = DMatrix::from_vec(2, 2, vec![1.0, 1.0, 0.0, 1.0]);
        let y = DVector::from_vec(vec![1.0, 2.0]);
        assert!(matches!(ols(&y, &x), Err(AnalysisError::ModelConvergence(_))));
    }
}
