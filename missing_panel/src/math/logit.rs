use crate::AnalysisError;
use nalgebra::{DMatrix, DVector};

/// Represents the results of a Logistic Regression.
#[derive(Debug)]
pub struct LogitResult {
    pub coefficients: DVector<f64>,
    /// Inverse of the observed information matrix at the optimum.
    pub vcov: DMatrix<f64>,
    pub predicted_probs: DVector<f64>,
    pub iterations: usize,
    pub n_obs: usize,
}

impl LogitResult {
    pub fn std_errors(&self) -> DVector<f64> {
        self.vcov.diagonal().map(|v| v.max(0.0).sqrt())
    }
}

/// Sigmoid function.
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Information matrix `X' W X` with `W = diag(p (1 - p))`.
fn information(x: &DMatrix<f64>, probs: &DVector<f64>) -> DMatrix<f64> {
    // Scale rows of X by sqrt(w), then compute the Gram matrix.
    let mut x_tilde = x.clone();
    for i in 0..x.nrows() {
        let w_i = (probs[i] * (1.0 - probs[i])).sqrt();
        x_tilde.row_mut(i).scale_mut(w_i);
    }
    x_tilde.transpose() * x_tilde
}

/// Performs Logistic Regression using Newton-Raphson optimization.
///
/// Fails with `ModelConvergence` instead of returning partial coefficients
/// when the iteration does not converge, the information matrix becomes
/// singular (typically perfect separation), or the outcome does not vary.
///
/// # Arguments
///
/// * `y` - A binary `DVector` (0.0 or 1.0) representing the outcome.
/// * `x` - A `DMatrix` representing the predictors (should include intercept).
/// * `max_iter` - Maximum number of iterations.
/// * `tol` - Convergence tolerance on the Newton step.
pub fn logit(
    y: &DVector<f64>,
    x: &DMatrix<f64>,
    max_iter: usize,
    tol: f64,
) -> Result<LogitResult, AnalysisError> {
    let n = x.nrows();
    let k = x.ncols();
    if n <= k {
        return Err(AnalysisError::ModelConvergence(format!(
            "{} complete observations are not enough to estimate {} parameters",
            n, k
        )));
    }
    if y.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(AnalysisError::ModelConvergence(
            "Logit response must be coded 0/1".to_string(),
        ));
    }
    let ones = y.sum();
    if ones == 0.0 || ones == n as f64 {
        return Err(AnalysisError::ModelConvergence(
            "Logit response does not vary".to_string(),
        ));
    }

    let mut beta = DVector::zeros(k);

    for iter in 0..max_iter {
        let probs: DVector<f64> = (x * &beta).map(sigmoid);
        if iter > 0 && y.iter().zip(probs.iter()).all(|(yi, pi)| (yi - pi).abs() < 1e-8) {
            return Err(AnalysisError::ModelConvergence(
                "Perfect separation detected; coefficients are not identified".to_string(),
            ));
        }
        let gradient = x.transpose() * (y - &probs);
        let info = information(x, &probs);

        let inv_info = info.try_inverse().ok_or_else(|| {
            AnalysisError::ModelConvergence(
                "Failed to invert Information Matrix in Logit. Perfect separation?".to_string(),
            )
        })?;

        let step = &inv_info * &gradient;
        if step.iter().any(|s| !s.is_finite()) {
            return Err(AnalysisError::ModelConvergence(
                "Newton step diverged in Logit".to_string(),
            ));
        }
        beta += &step;

        if step.norm() < tol {
            let probs = (x * &beta).map(sigmoid);
            let vcov = information(x, &probs).try_inverse().ok_or_else(|| {
                AnalysisError::ModelConvergence(
                    "Information matrix is singular at the optimum".to_string(),
                )
            })?;
            return Ok(LogitResult {
                coefficients: beta,
                vcov,
                predicted_probs: probs,
                iterations: iter + 1,
                n_obs: n,
            });
        }
    }

    Err(AnalysisError::ModelConvergence(format!(
        "Logit did not converge in {} iterations",
        max_iter
    )))
}
