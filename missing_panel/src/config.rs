//! Run configuration.
//!
//! Column roles, test options, imputation parameters and the run seed are all
//! passed explicitly through [`AnalysisConfig`]; nothing is read from global
//! state.

use crate::AnalysisError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters of the stochastic median fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StochasticParams {
    /// Share of the column's standard deviation used as the draw spread.
    pub sd_share: f64,
    /// Fixed offset added to the draw spread.
    pub sd_fixed: f64,
    /// Number of draws averaged into each filled cell.
    pub draws: usize,
}

impl Default for StochasticParams {
    fn default() -> Self {
        Self {
            sd_share: 0.25,
            sd_fixed: 0.0,
            draws: 1,
        }
    }
}

/// Names of the two derived missingness indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagNames {
    pub covariates: String,
    pub outcome: String,
}

impl Default for FlagNames {
    fn default() -> Self {
        Self {
            covariates: "missing_covariates".to_string(),
            outcome: "missing_outcome".to_string(),
        }
    }
}

/// Everything a diagnostic or imputation run needs to know about the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub treatment: String,
    pub outcome: String,
    pub covariates: Vec<String>,
    /// Identifier columns; carried through but never used in computation.
    pub identifiers: Vec<String>,
    /// Columns left out of the diagnostic tables.
    pub excluded: Vec<String>,
    /// Continuous covariates split into quartile indicators for the
    /// association test.
    pub quartile_columns: Vec<String>,
    /// Continuous covariates split at the median for the association test.
    pub median_columns: Vec<String>,
    /// Pooled-variance t-test for the treatment integrity check.
    pub equal_var: bool,
    pub bonferroni: u32,
    pub knn_neighbors: usize,
    pub stochastic: StochasticParams,
    pub seed: u64,
    pub flag_names: FlagNames,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            treatment: "treatment".to_string(),
            outcome: "outcome".to_string(),
            covariates: Vec::new(),
            identifiers: Vec::new(),
            excluded: Vec::new(),
            quartile_columns: Vec::new(),
            median_columns: Vec::new(),
            equal_var: true,
            bonferroni: 1,
            knn_neighbors: 1,
            stochastic: StochasticParams::default(),
            seed: 42,
            flag_names: FlagNames::default(),
        }
    }
}

impl AnalysisConfig {
    /// Reads a configuration from a JSON file. Missing keys take their
    /// default values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig = serde_json::from_str(text)
            .map_err(|e| AnalysisError::InvalidConfig(format!("malformed JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.knn_neighbors == 0 {
            return Err(AnalysisError::InvalidConfig(
                "knn_neighbors must be at least 1".to_string(),
            ));
        }
        if self.stochastic.draws == 0 {
            return Err(AnalysisError::InvalidConfig(
                "stochastic.draws must be at least 1".to_string(),
            ));
        }
        if self.bonferroni == 0 {
            return Err(AnalysisError::InvalidConfig(
                "bonferroni must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("sd_share", self.stochastic.sd_share),
            ("sd_fixed", self.stochastic.sd_fixed),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalysisError::InvalidConfig(format!(
                    "stochastic.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.covariates.contains(&self.treatment) {
            return Err(AnalysisError::InvalidConfig(format!(
                "treatment column '{}' cannot also be a covariate",
                self.treatment
            )));
        }
        if self.covariates.contains(&self.outcome) {
            return Err(AnalysisError::InvalidConfig(format!(
                "outcome column '{}' cannot also be a covariate",
                self.outcome
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AnalysisConfig::from_json_str(
            r#"{"treatment": "assigned", "covariates": ["age"], "stochastic": {"draws": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.treatment, "assigned");
        assert_eq!(config.outcome, "outcome");
        assert_eq!(config.knn_neighbors, 1);
        assert_eq!(config.stochastic.draws, 5);
        assert_eq!(config.stochastic.sd_share, 0.25);
        assert_eq!(config.seed, 42);
        assert_eq!(config.flag_names.outcome, "missing_outcome");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AnalysisConfig::default();
        assert!(config.validate().is_ok());

        config.knn_neighbors = 0;
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))));

        let mut config = AnalysisConfig::default();
        config.stochastic.sd_fixed = -1.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.covariates = vec!["treatment".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            AnalysisConfig::from_json_str("{not json"),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }
}
