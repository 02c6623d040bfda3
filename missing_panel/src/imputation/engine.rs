use crate::config::{AnalysisConfig, StochasticParams};
use crate::dataset::{numeric_column, numeric_columns, split_binary, take, with_columns};
use crate::imputation::knn::KnnImputer;
use crate::imputation::univariate::{fill_column_max, fill_column_min, fill_stochastic_median};
use crate::AnalysisError;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

/// How missing cells of the target columns are filled within each arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImputationStrategy {
    Knn,
    StochasticMedian,
    ColumnMax,
    ColumnMin,
}

/// The four complete-data variants compared in the treatment-effect table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImputedVariant {
    /// kNN for covariates and outcome.
    Knn,
    /// kNN for covariates, stochastic median for the outcome.
    KnnStochastic,
    /// kNN for covariates, arm maximum for the outcome.
    KnnMax,
    /// kNN for covariates, arm minimum for the outcome.
    KnnMin,
}

impl ImputedVariant {
    pub const ALL: [ImputedVariant; 4] = [
        ImputedVariant::Knn,
        ImputedVariant::KnnStochastic,
        ImputedVariant::KnnMax,
        ImputedVariant::KnnMin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ImputedVariant::Knn => "knn",
            ImputedVariant::KnnStochastic => "knn_stochastic",
            ImputedVariant::KnnMax => "knn_max",
            ImputedVariant::KnnMin => "knn_min",
        }
    }

    /// Strategy used for the outcome column.
    pub fn outcome_strategy(&self) -> ImputationStrategy {
        match self {
            ImputedVariant::Knn => ImputationStrategy::Knn,
            ImputedVariant::KnnStochastic => ImputationStrategy::StochasticMedian,
            ImputedVariant::KnnMax => ImputationStrategy::ColumnMax,
            ImputedVariant::KnnMin => ImputationStrategy::ColumnMin,
        }
    }
}

/// Row positions of one treatment arm.
struct Arm {
    label: &'static str,
    rows: Vec<usize>,
}

/// Fills missing values separately within each treatment arm.
///
/// No value observed in one arm ever influences a value imputed in the other.
/// The source frame is never modified; every call returns a new frame with
/// rows in the source order.
#[derive(Debug, Clone)]
pub struct StratifiedImputer {
    dataframe: DataFrame,
    treatment: String,
    k_neighbors: usize,
    stochastic: StochasticParams,
    seed: u64,
}

impl StratifiedImputer {
    pub fn new(dataframe: DataFrame, treatment: &str) -> Self {
        Self {
            dataframe,
            treatment: treatment.to_string(),
            k_neighbors: 1,
            stochastic: StochasticParams::default(),
            seed: 42,
        }
    }

    /// Builds an imputer with the neighbor count, stochastic parameters and
    /// seed taken from `config`.
    pub fn from_config(dataframe: DataFrame, config: &AnalysisConfig) -> Self {
        let mut imputer = Self::new(dataframe, &config.treatment);
        imputer
            .k_neighbors(config.knn_neighbors)
            .stochastic(config.stochastic.clone())
            .seed(config.seed);
        imputer
    }

    pub fn k_neighbors(&mut self, k: usize) -> &mut Self {
        self.k_neighbors = k;
        self
    }

    pub fn stochastic(&mut self, params: StochasticParams) -> &mut Self {
        self.stochastic = params;
        self
    }

    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.seed = seed;
        self
    }

    /// Imputes `targets` with one strategy and checks that none of them is
    /// left with a missing value.
    pub fn impute(
        &self,
        strategy: ImputationStrategy,
        targets: &[String],
    ) -> Result<DataFrame, AnalysisError> {
        self.impute_frame(&self.dataframe, strategy, targets)
    }

    /// Produces one of the named complete-data variants.
    ///
    /// Covariates are always completed by kNN run jointly over covariates and
    /// outcome. For the non-kNN variants the kNN outcome is then discarded and
    /// the outcome is filled from its own observed values in each arm.
    pub fn impute_variant(
        &self,
        variant: ImputedVariant,
        covariates: &[String],
        outcome: &str,
    ) -> Result<DataFrame, AnalysisError> {
        info!(variant = variant.name(), "building imputed variant");
        let mut targets = covariates.to_vec();
        targets.push(outcome.to_string());
        let knn = self.impute_frame(&self.dataframe, ImputationStrategy::Knn, &targets)?;
        if variant == ImputedVariant::Knn {
            return Ok(knn);
        }
        let original_outcome = numeric_column(&self.dataframe, outcome)?;
        let covariates_done = with_columns(&knn, vec![(outcome.to_string(), original_outcome)])?;
        self.impute_frame(
            &covariates_done,
            variant.outcome_strategy(),
            &[outcome.to_string()],
        )
    }

    fn arms(&self, df: &DataFrame) -> Result<[Arm; 2], AnalysisError> {
        let treatment = numeric_column(df, &self.treatment)?;
        let split = split_binary(&treatment, &self.treatment)?;
        if !split.excluded.is_empty() {
            return Err(AnalysisError::InvalidGrouping {
                column: self.treatment.clone(),
                reason: format!(
                    "treatment is missing in {} row(s); imputation needs every row assigned",
                    split.excluded.len()
                ),
            });
        }
        // Treated arm first: the stochastic fill consumes the random stream
        // in this order.
        Ok([
            Arm {
                label: "treated",
                rows: split.group1,
            },
            Arm {
                label: "control",
                rows: split.group0,
            },
        ])
    }

    fn impute_frame(
        &self,
        df: &DataFrame,
        strategy: ImputationStrategy,
        targets: &[String],
    ) -> Result<DataFrame, AnalysisError> {
        if targets.iter().any(|t| *t == self.treatment) {
            return Err(AnalysisError::InvalidConfig(format!(
                "treatment column '{}' cannot be an imputation target",
                self.treatment
            )));
        }
        let arms = self.arms(df)?;
        let columns = numeric_columns(df, targets)?;
        info!(
            ?strategy,
            targets = targets.len(),
            treated = arms[0].rows.len(),
            control = arms[1].rows.len(),
            "imputing by treatment arm"
        );

        let arm_columns = |arm: &Arm| -> Vec<Vec<Option<f64>>> {
            columns.iter().map(|c| take(c, &arm.rows)).collect()
        };

        let filled: Vec<Vec<Vec<Option<f64>>>> = match strategy {
            ImputationStrategy::StochasticMedian => {
                // One stream per run, consumed arm by arm, column by column.
                let mut rng = StdRng::seed_from_u64(self.seed);
                let mut out = Vec::with_capacity(arms.len());
                for arm in &arms {
                    let block = arm_columns(arm)
                        .iter()
                        .map(|c| fill_stochastic_median(c, &self.stochastic, &mut rng))
                        .collect::<Result<Vec<_>, _>>()?;
                    out.push(block);
                }
                out
            }
            _ => arms
                .par_iter()
                .map(|arm| {
                    debug!(arm = arm.label, rows = arm.rows.len(), "imputing arm");
                    let block = arm_columns(arm);
                    match strategy {
                        ImputationStrategy::Knn => KnnImputer::new(self.k_neighbors).impute(&block),
                        ImputationStrategy::ColumnMax => {
                            block.iter().map(|c| fill_column_max(c)).collect()
                        }
                        _ => block.iter().map(|c| fill_column_min(c)).collect(),
                    }
                })
                .collect(),
        };

        // Write each arm back into its original row positions.
        let mut result = columns.clone();
        for (arm, block) in arms.iter().zip(filled) {
            for (j, column) in block.into_iter().enumerate() {
                for (local, value) in column.into_iter().enumerate() {
                    result[j][arm.rows[local]] = value;
                }
            }
        }

        for (name, column) in targets.iter().zip(&result) {
            let remaining = column.iter().filter(|v| v.is_none()).count();
            if remaining > 0 {
                return Err(AnalysisError::IncompleteImputation {
                    column: name.clone(),
                    remaining,
                });
            }
        }

        with_columns(df, targets.iter().cloned().zip(result).collect())
    }
}
