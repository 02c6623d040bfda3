use missing_panel::dataset::numeric_column;
use missing_panel::imputation::knn::KnnImputer;
use missing_panel::{
    AnalysisError, ImputationStrategy, ImputedVariant, StochasticParams, StratifiedImputer,
};
use polars::prelude::*;

const N: Option<f64> = None;
const COLUMNS: [&str; 5] = ["a", "b", "c", "d", "e"];

fn row(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

fn to_columns(rows: &[Vec<Option<f64>>]) -> Vec<Vec<Option<f64>>> {
    (0..rows[0].len())
        .map(|j| rows.iter().map(|r| r[j]).collect())
        .collect()
}

fn assert_close(actual: &[Vec<Option<f64>>], expected: &[Vec<f64>]) {
    let columns = to_columns(&expected.iter().map(|r| row(r)).collect::<Vec<_>>());
    for (j, (a, e)) in actual.iter().zip(columns.iter()).enumerate() {
        for (i, (x, y)) in a.iter().zip(e.iter()).enumerate() {
            let x = x.unwrap_or_else(|| panic!("cell ({}, {}) still missing", i, j));
            let y = y.unwrap();
            assert!((x - y).abs() < 1e-6, "cell ({}, {}): {} != {}", i, j, x, y);
        }
    }
}

/// Six rows, five columns, scattered gaps.
fn scattered() -> Vec<Vec<Option<f64>>> {
    vec![
        vec![N, Some(6.0), N, Some(1.0), N],
        row(&[4.0, 8.0, 5.0, 3.0, 1.0]),
        vec![N, Some(0.0), Some(1.0), Some(0.0), Some(1.0)],
        vec![Some(1.0), N, Some(3.0), Some(0.0), N],
        vec![Some(3.0), N, Some(2.0), Some(0.0), Some(4.0)],
        vec![N, Some(2.0), Some(3.0), Some(1.0), Some(0.0)],
    ]
}

fn scattered_k1_expected() -> Vec<Vec<f64>> {
    // Rows 3 and 4 are tied for row 0, column a in exact arithmetic; the
    // expanded distance puts row 4 first.
    vec![
        vec![3.0, 6.0, 3.0, 1.0, 0.0],
        vec![4.0, 8.0, 5.0, 3.0, 1.0],
        vec![1.0, 0.0, 1.0, 0.0, 1.0],
        vec![1.0, 2.0, 3.0, 0.0, 0.0],
        vec![3.0, 6.0, 2.0, 0.0, 4.0],
        vec![1.0, 2.0, 3.0, 1.0, 0.0],
    ]
}

/// Builds a frame with the fixture rows in both arms: treated first, then
/// control.
fn stacked_frame(rows: &[Vec<Option<f64>>]) -> DataFrame {
    let columns = to_columns(rows);
    let mut treatment = vec![1.0; rows.len()];
    treatment.extend(vec![0.0; rows.len()]);
    let mut frame_columns = vec![Column::new("treatment".into(), treatment)];
    for (name, values) in COLUMNS.iter().zip(columns) {
        let mut doubled = values.clone();
        doubled.extend(values);
        frame_columns.push(Column::new((*name).into(), doubled));
    }
    DataFrame::new(frame_columns).unwrap()
}

fn targets() -> Vec<String> {
    COLUMNS.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_knn_single_neighbor_fixture() {
    let out = KnnImputer::new(1).impute(&to_columns(&scattered()));
    assert_close(&out, &scattered_k1_expected());
}

#[test]
fn test_knn_two_neighbor_fixture() {
    let rows = vec![
        vec![N, Some(3.0), Some(4.0), Some(1.0), N],
        vec![Some(4.0), N, Some(5.0), Some(1.0), Some(1.0)],
        vec![N, Some(0.0), Some(1.0), Some(0.0), Some(1.0)],
        vec![Some(1.0), N, Some(3.0), Some(0.0), N],
        vec![Some(3.0), N, Some(2.0), Some(0.0), Some(4.0)],
        vec![N, Some(2.0), Some(3.0), Some(1.0), Some(0.0)],
        vec![Some(3.0), Some(2.0), N, Some(0.0), Some(8.0)],
        row(&[6.0, 6.0, 3.0, 0.0, 2.0]),
        vec![N, Some(4.0), Some(3.0), Some(1.0), Some(3.0)],
    ];
    let expected = vec![
        vec![3.5, 3.0, 4.0, 1.0, 1.5],
        vec![4.0, 2.5, 5.0, 1.0, 1.0],
        vec![2.0, 0.0, 1.0, 0.0, 1.0],
        vec![1.0, 1.0, 3.0, 0.0, 6.0],
        vec![3.0, 1.0, 2.0, 0.0, 4.0],
        vec![2.5, 2.0, 3.0, 1.0, 0.0],
        vec![3.0, 2.0, 2.5, 0.0, 8.0],
        vec![6.0, 6.0, 3.0, 0.0, 2.0],
        vec![5.0, 4.0, 3.0, 1.0, 3.0],
    ];
    let out = KnnImputer::new(2).impute(&to_columns(&rows));
    assert_close(&out, &expected);
}

#[test]
fn test_knn_fully_missing_row_gets_column_means() {
    let mut rows = scattered();
    rows[0] = vec![N; 5];
    let out = KnnImputer::new(1).impute(&to_columns(&rows));
    let expected = vec![
        vec![8.0 / 3.0, 10.0 / 3.0, 2.8, 0.8, 1.5],
        vec![4.0, 8.0, 5.0, 3.0, 1.0],
        vec![1.0, 0.0, 1.0, 0.0, 1.0],
        vec![1.0, 2.0, 3.0, 0.0, 0.0],
        vec![3.0, 0.0, 2.0, 0.0, 4.0],
        vec![1.0, 2.0, 3.0, 1.0, 0.0],
    ];
    assert_close(&out, &expected);
}

#[test]
fn test_stratified_knn_reproduces_fixture_in_each_arm() {
    let df = stacked_frame(&scattered());
    let out = StratifiedImputer::new(df, "treatment")
        .impute(ImputationStrategy::Knn, &targets())
        .unwrap();
    let expected = scattered_k1_expected();
    for (j, name) in COLUMNS.iter().enumerate() {
        let values = numeric_column(&out, name).unwrap();
        for (i, v) in values.iter().enumerate() {
            let e = expected[i % 6][j];
            assert!((v.unwrap() - e).abs() < 1e-6);
        }
    }
}

#[test]
fn test_arms_do_not_influence_each_other() {
    let rows = scattered();
    let base = stacked_frame(&rows);

    // Perturb every observed control value; treated rows stay as they were.
    let mut perturbed = base.clone();
    for name in COLUMNS {
        let values = numeric_column(&base, name).unwrap();
        let changed: Vec<Option<f64>> = values
            .iter()
            .enumerate()
            .map(|(i, v)| if i >= rows.len() { v.map(|x| x * 7.0 - 3.0) } else { *v })
            .collect();
        perturbed
            .with_column(Column::new(name.into(), changed))
            .unwrap();
    }

    for strategy in [
        ImputationStrategy::Knn,
        ImputationStrategy::StochasticMedian,
        ImputationStrategy::ColumnMax,
        ImputationStrategy::ColumnMin,
    ] {
        let a = StratifiedImputer::new(base.clone(), "treatment")
            .impute(strategy, &targets())
            .unwrap();
        let b = StratifiedImputer::new(perturbed.clone(), "treatment")
            .impute(strategy, &targets())
            .unwrap();
        for name in COLUMNS {
            let va = numeric_column(&a, name).unwrap();
            let vb = numeric_column(&b, name).unwrap();
            assert_eq!(va[..rows.len()], vb[..rows.len()], "{:?} {}", strategy, name);
        }
    }
}

#[test]
fn test_every_strategy_completes_targets() {
    let df = stacked_frame(&scattered());
    let mut imputer = StratifiedImputer::new(df.clone(), "treatment");
    imputer.k_neighbors(3).stochastic(StochasticParams {
        sd_share: 0.5,
        sd_fixed: 0.1,
        draws: 10,
    });
    for strategy in [
        ImputationStrategy::Knn,
        ImputationStrategy::StochasticMedian,
        ImputationStrategy::ColumnMax,
        ImputationStrategy::ColumnMin,
    ] {
        let out = imputer.impute(strategy, &targets()).unwrap();
        assert_eq!(out.height(), df.height());
        for name in COLUMNS {
            let values = numeric_column(&out, name).unwrap();
            assert!(values.iter().all(Option::is_some), "{:?} {}", strategy, name);
        }
    }
    // The source frame is left untouched.
    assert!(numeric_column(&df, "a").unwrap()[0].is_none());
}

#[test]
fn test_every_variant_completes_covariates_and_outcome() {
    let df = stacked_frame(&scattered());
    let imputer = StratifiedImputer::new(df, "treatment");
    let covariates: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
    for variant in ImputedVariant::ALL {
        let out = imputer.impute_variant(variant, &covariates, "e").unwrap();
        for name in COLUMNS {
            let values = numeric_column(&out, name).unwrap();
            assert!(values.iter().all(Option::is_some), "{} {}", variant.name(), name);
        }
    }
}

#[test]
fn test_knn_outcome_variants_differ_only_in_outcome() {
    let df = stacked_frame(&scattered());
    let imputer = StratifiedImputer::new(df, "treatment");
    let covariates: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
    let knn = imputer
        .impute_variant(ImputedVariant::Knn, &covariates, "e")
        .unwrap();
    let min = imputer
        .impute_variant(ImputedVariant::KnnMin, &covariates, "e")
        .unwrap();
    for name in &covariates {
        assert_eq!(
            numeric_column(&knn, name).unwrap(),
            numeric_column(&min, name).unwrap()
        );
    }
    // Observed outcome minimum in each arm is 0.
    let e = numeric_column(&min, "e").unwrap();
    assert_eq!(e[0], Some(0.0));
    assert_eq!(e[3], Some(0.0));
}

#[test]
fn test_column_missing_in_one_arm_is_reported() {
    let df = df!(
        "treatment" => &[1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
        "x" => &[Some(1.0), Some(2.0), Some(3.0), None, None, None],
        "y" => &[Some(1.0), None, Some(3.0), Some(4.0), None, Some(6.0)]
    )
    .unwrap();
    let imputer = StratifiedImputer::new(df, "treatment");
    let targets = vec!["x".to_string(), "y".to_string()];
    for strategy in [ImputationStrategy::Knn, ImputationStrategy::StochasticMedian] {
        match imputer.impute(strategy, &targets) {
            Err(AnalysisError::IncompleteImputation { column, remaining }) => {
                assert_eq!(column, "x");
                assert_eq!(remaining, 3);
            }
            other => panic!("expected IncompleteImputation, got {:?}", other),
        }
    }
}
