//! The end-to-end missingness diagnostic.
//!
//! [`MissingnessReport::run`] derives the missingness flags, checks
//! randomization integrity, compares respondents with non-respondents under
//! the three test procedures, models the flags with logits and estimates the
//! treatment effect on complete cases and on every imputed variant.
//! Independent units run in parallel. A unit that fails is recorded in
//! `failures` and does not stop its siblings.

use crate::comparison::{compare_columns, ComparisonTable, StatisticKind};
use crate::config::AnalysisConfig;
use crate::dataset::{
    ensure_columns, filter_rows, numeric_column, numeric_column_names, numeric_columns,
};
use crate::discretize::replace_with_indicators;
use crate::imputation::engine::{ImputedVariant, StratifiedImputer};
use crate::missingness::add_missingness_flags;
use crate::regression::{fit_model, ModelKind, RegressionOutput};
use crate::AnalysisError;
use comfy_table::{Cell, Table};
use getset::Getters;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

/// A unit of work that failed, with the error it produced.
#[derive(Debug, Clone, Getters, Serialize)]
#[getset(get = "pub")]
pub struct UnitFailure {
    unit: String,
    error: String,
}

#[derive(Debug, Clone, Getters, Serialize)]
#[getset(get = "pub")]
pub struct LabeledComparison {
    label: String,
    table: ComparisonTable,
}

#[derive(Debug, Clone, Getters, Serialize)]
#[getset(get = "pub")]
pub struct LabeledRegression {
    label: String,
    output: RegressionOutput,
}

/// Missing cells in the imputation targets before and after building one
/// variant.
#[derive(Debug, Clone, Getters, Serialize)]
#[getset(get = "pub")]
pub struct VariantCompleteness {
    variant: String,
    rows: usize,
    missing_before: usize,
    missing_after: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Integrity,
    MeanTest,
    VarianceTest,
    AssociationTest,
}

struct ComparisonUnit<'a> {
    section: Section,
    label: String,
    frame: &'a DataFrame,
    grouping: String,
    columns: Vec<String>,
    kind: StatisticKind,
}

struct RegressionUnit<'a> {
    flag_model: bool,
    label: String,
    frame: &'a DataFrame,
    response: String,
    regressors: Vec<String>,
    kind: ModelKind,
}

/// Every table produced by one diagnostic run.
#[derive(Debug, Clone, Getters, Serialize)]
#[getset(get = "pub")]
pub struct MissingnessReport {
    bonferroni: u32,
    /// Mean tests by treatment on the full sample and on outcome respondents.
    integrity: Vec<LabeledComparison>,
    /// Welch tests by each missingness flag.
    mean_tests: Vec<LabeledComparison>,
    /// Levene tests by each missingness flag.
    variance_tests: Vec<LabeledComparison>,
    /// Chi-square tests by each missingness flag on discretized covariates.
    association_tests: Vec<LabeledComparison>,
    /// Logits of the missingness flags.
    flag_models: Vec<LabeledRegression>,
    /// OLS of the outcome on treatment, with and without covariates.
    treatment_effects: Vec<LabeledRegression>,
    variants: Vec<VariantCompleteness>,
    failures: Vec<UnitFailure>,
}

fn count_missing(df: &DataFrame, columns: &[String]) -> Result<usize, AnalysisError> {
    Ok(numeric_columns(df, columns)?
        .iter()
        .map(|c| c.iter().filter(|v| v.is_none()).count())
        .sum())
}

/// Builds all four imputed variants, in parallel. Each entry carries its own
/// result so that one failing variant leaves the others usable.
pub fn impute_variants(
    df: &DataFrame,
    config: &AnalysisConfig,
) -> Vec<(ImputedVariant, Result<DataFrame, AnalysisError>)> {
    let imputer = StratifiedImputer::from_config(df.clone(), config);
    ImputedVariant::ALL
        .par_iter()
        .map(|&variant| {
            let result = imputer.impute_variant(variant, &config.covariates, &config.outcome);
            (variant, result)
        })
        .collect()
}

/// Missing-cell counts for each successfully built variant.
pub fn variant_completeness(
    df: &DataFrame,
    config: &AnalysisConfig,
    variants: &[(ImputedVariant, Result<DataFrame, AnalysisError>)],
) -> Result<Vec<VariantCompleteness>, AnalysisError> {
    let mut targets = config.covariates.clone();
    targets.push(config.outcome.clone());
    let missing_before = count_missing(df, &targets)?;
    variants
        .iter()
        .filter_map(|(variant, result)| result.as_ref().ok().map(|frame| (variant, frame)))
        .map(|(variant, frame)| {
            Ok(VariantCompleteness {
                variant: variant.name().to_string(),
                rows: frame.height(),
                missing_before,
                missing_after: count_missing(frame, &targets)?,
            })
        })
        .collect()
}

impl MissingnessReport {
    pub fn run(df: &DataFrame, config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let mut required = vec![config.treatment.clone(), config.outcome.clone()];
        required.extend(config.covariates.iter().cloned());
        required.extend(config.quartile_columns.iter().cloned());
        required.extend(config.median_columns.iter().cloned());
        ensure_columns(df, &required)?;

        let flags = &config.flag_names;
        let flagged = add_missingness_flags(df, &config.covariates, &config.outcome, flags)?;
        info!(
            rows = flagged.height(),
            covariates = config.covariates.len(),
            "derived missingness flags"
        );

        // Columns never compared: roles outside the analysis and the derived flags.
        let mut skipped: Vec<String> = config
            .identifiers
            .iter()
            .chain(config.excluded.iter())
            .cloned()
            .collect();
        skipped.push(flags.covariates.clone());
        skipped.push(flags.outcome.clone());
        skipped.push(config.outcome.clone());

        let integrity_columns = {
            let mut exclude = skipped.clone();
            exclude.push(config.treatment.clone());
            numeric_column_names(&flagged, &exclude)
        };
        // Flag comparisons also cover treatment and the other flag.
        let flag_columns = |frame: &DataFrame| -> Vec<String> {
            let exclude: Vec<String> = skipped
                .iter()
                .filter(|c| **c != flags.covariates && **c != flags.outcome)
                .cloned()
                .collect();
            numeric_column_names(frame, &exclude)
        };

        let outcome_flag = numeric_column(&flagged, &flags.outcome)?;
        let respondent_mask: Vec<bool> = outcome_flag.iter().map(|v| *v == Some(0.0)).collect();
        let respondents = filter_rows(&flagged, &respondent_mask)?;
        let discretized =
            replace_with_indicators(&flagged, &config.quartile_columns, &config.median_columns)?;
        let association_columns = flag_columns(&discretized);
        let comparison_columns = flag_columns(&flagged);

        let integrity_kind = StatisticKind::MeanTest {
            equal_var: config.equal_var,
        };
        let mut comparison_units = vec![
            ComparisonUnit {
                section: Section::Integrity,
                label: "full sample".to_string(),
                frame: &flagged,
                grouping: config.treatment.clone(),
                columns: integrity_columns.clone(),
                kind: integrity_kind,
            },
            ComparisonUnit {
                section: Section::Integrity,
                label: "respondents".to_string(),
                frame: &respondents,
                grouping: config.treatment.clone(),
                columns: integrity_columns,
                kind: integrity_kind,
            },
        ];
        for flag in [&flags.covariates, &flags.outcome] {
            let sections = [
                (Section::MeanTest, StatisticKind::MeanTest { equal_var: false }),
                (Section::VarianceTest, StatisticKind::VarianceTest),
            ];
            for (section, kind) in sections {
                comparison_units.push(ComparisonUnit {
                    section,
                    label: flag.clone(),
                    frame: &flagged,
                    grouping: flag.clone(),
                    columns: comparison_columns.clone(),
                    kind,
                });
            }
            comparison_units.push(ComparisonUnit {
                section: Section::AssociationTest,
                label: flag.clone(),
                frame: &discretized,
                grouping: flag.clone(),
                columns: association_columns.clone(),
                kind: StatisticKind::AssociationTest,
            });
        }

        info!(units = comparison_units.len(), "running group comparisons");
        let comparison_results: Vec<(Section, String, Result<ComparisonTable, AnalysisError>)> =
            comparison_units
                .par_iter()
                .map(|unit| {
                    let result =
                        compare_columns(unit.frame, &unit.grouping, &unit.columns, unit.kind);
                    (unit.section, unit.label.clone(), result)
                })
                .collect();

        let mut report = MissingnessReport {
            bonferroni: config.bonferroni,
            integrity: Vec::new(),
            mean_tests: Vec::new(),
            variance_tests: Vec::new(),
            association_tests: Vec::new(),
            flag_models: Vec::new(),
            treatment_effects: Vec::new(),
            variants: Vec::new(),
            failures: Vec::new(),
        };
        for (section, label, result) in comparison_results {
            let table = match result {
                Ok(table) => table,
                Err(e) => {
                    report.record_failure(format!("{:?}/{}", section, label), &e);
                    continue;
                }
            };
            let entry = LabeledComparison { label, table };
            match section {
                Section::Integrity => report.integrity.push(entry),
                Section::MeanTest => report.mean_tests.push(entry),
                Section::VarianceTest => report.variance_tests.push(entry),
                Section::AssociationTest => report.association_tests.push(entry),
            }
        }

        info!("building imputed variants");
        let variants = impute_variants(df, config);
        report.variants = variant_completeness(df, config, &variants)?;

        // Covariates with gaps would make the covariate flag constant after
        // listwise deletion, so the flag models use the complete ones only.
        let complete_covariates: Vec<String> = config
            .covariates
            .iter()
            .zip(numeric_columns(&flagged, &config.covariates)?)
            .filter(|(_, values)| values.iter().all(Option::is_some))
            .map(|(name, _)| name.clone())
            .collect();
        let mut flag_regressors = vec![config.treatment.clone()];
        flag_regressors.extend(complete_covariates);

        let mut regression_units = vec![
            RegressionUnit {
                flag_model: true,
                label: flags.covariates.clone(),
                frame: &flagged,
                response: flags.covariates.clone(),
                regressors: flag_regressors.clone(),
                kind: ModelKind::Logit,
            },
            RegressionUnit {
                flag_model: true,
                label: flags.outcome.clone(),
                frame: &flagged,
                response: flags.outcome.clone(),
                regressors: {
                    let mut r = flag_regressors;
                    r.push(flags.covariates.clone());
                    r
                },
                kind: ModelKind::Logit,
            },
        ];

        let mut samples: Vec<(String, &DataFrame)> = vec![("complete_case".to_string(), df)];
        for (variant, result) in &variants {
            match result {
                Ok(frame) => samples.push((variant.name().to_string(), frame)),
                Err(e) => report.record_failure(format!("imputation/{}", variant.name()), e),
            }
        }
        let mut with_controls = vec![config.treatment.clone()];
        with_controls.extend(config.covariates.iter().cloned());
        for (sample, frame) in &samples {
            for (suffix, regressors) in [
                ("no_controls", vec![config.treatment.clone()]),
                ("controls", with_controls.clone()),
            ] {
                regression_units.push(RegressionUnit {
                    flag_model: false,
                    label: format!("{}/{}", sample, suffix),
                    frame: *frame,
                    response: config.outcome.clone(),
                    regressors,
                    kind: ModelKind::Linear,
                });
            }
        }

        info!(units = regression_units.len(), "fitting models");
        let regression_results: Vec<(bool, String, Result<RegressionOutput, AnalysisError>)> =
            regression_units
                .par_iter()
                .map(|unit| {
                    let result =
                        fit_model(unit.frame, &unit.response, &unit.regressors, unit.kind);
                    (unit.flag_model, unit.label.clone(), result)
                })
                .collect();
        for (flag_model, label, result) in regression_results {
            match result {
                Ok(output) => {
                    let entry = LabeledRegression { label, output };
                    if flag_model {
                        report.flag_models.push(entry);
                    } else {
                        report.treatment_effects.push(entry);
                    }
                }
                Err(e) => report.record_failure(format!("regression/{}", label), &e),
            }
        }

        info!(failures = report.failures.len(), "diagnostic run finished");
        Ok(report)
    }

    fn record_failure(&mut self, unit: String, error: &AnalysisError) {
        warn!(unit = %unit, error = %error, "unit failed");
        self.failures.push(UnitFailure {
            unit,
            error: error.to_string(),
        });
    }

    /// Looks up a treatment-effect regression by its `sample/specification`
    /// label, e.g. `knn/controls`.
    pub fn treatment_effect(&self, label: &str) -> Option<&RegressionOutput> {
        self.treatment_effects
            .iter()
            .find(|e| e.label == label)
            .map(|e| &e.output)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Prints every table to the console.
    pub fn summary(&self) {
        println!("Missingness Diagnostics");
        println!("========================================");
        let sections = [
            ("Randomization integrity", &self.integrity),
            ("Mean comparison by missingness", &self.mean_tests),
            ("Variance comparison by missingness", &self.variance_tests),
            ("Association by missingness", &self.association_tests),
        ];
        for (title, entries) in sections {
            for entry in entries {
                println!("\n{} ({})", title, entry.label);
                entry.table.summary(self.bonferroni);
            }
        }
        for entry in self.flag_models.iter().chain(self.treatment_effects.iter()) {
            println!("\n[{}]", entry.label);
            entry.output.summary(self.bonferroni);
        }

        if !self.variants.is_empty() {
            let mut table = Table::new();
            table.set_header(vec!["Variant", "Rows", "Missing before", "Missing after"]);
            for v in &self.variants {
                table.add_row(vec![
                    Cell::new(&v.variant),
                    Cell::new(v.rows),
                    Cell::new(v.missing_before),
                    Cell::new(v.missing_after),
                ]);
            }
            println!("\nImputed variants");
            println!("{}", table);
        }

        if !self.failures.is_empty() {
            let mut table = Table::new();
            table.set_header(vec!["Unit", "Error"]);
            for f in &self.failures {
                table.add_row(vec![Cell::new(&f.unit), Cell::new(&f.error)]);
            }
            println!("\nFailed units");
            println!("{}", table);
        }
    }
}
