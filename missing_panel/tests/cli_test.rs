use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn panel_command(subcommand: &str) -> Command {
    panel_command_with_outcome(subcommand, "income")
}

fn panel_command_with_outcome(subcommand: &str, outcome: &str) -> Command {
    let mut cmd = Command::cargo_bin("missing-panel").unwrap();
    cmd.arg(subcommand)
        .arg("--data")
        .arg("tests/data/panel.csv")
        .arg("--treatment")
        .arg("treatment")
        .arg("--outcome")
        .arg(outcome)
        .arg("--covariates")
        .arg("age,grade,female,risk_std")
        .arg("--identifiers")
        .arg("id")
        .arg("--quartile-columns")
        .arg("age,grade")
        .arg("--median-columns")
        .arg("risk_std");
    cmd
}

#[test]
fn test_diagnose() {
    let mut cmd = panel_command("diagnose");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Missingness Diagnostics"))
        .stdout(predicate::str::contains("Randomization integrity (full sample)"))
        .stdout(predicate::str::contains("Randomization integrity (respondents)"))
        .stdout(predicate::str::contains("[knn/controls]"))
        .stdout(predicate::str::contains("Imputed variants"));
}

#[test]
fn test_impute() {
    let mut cmd = panel_command("impute");
    cmd.arg("--k-neighbors").arg("3").arg("--draws").arg("10");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Imputed variants"))
        .stdout(predicate::str::contains("knn_stochastic"))
        .stdout(predicate::str::contains("knn_min"))
        .stdout(predicate::str::contains("failed").not());
}

#[test]
fn test_config_file() {
    let mut cmd = Command::cargo_bin("missing-panel").unwrap();
    cmd.arg("diagnose")
        .arg("--data")
        .arg("tests/data/panel.csv")
        .arg("--config")
        .arg("tests/data/panel_config.json")
        .arg("--bonferroni")
        .arg("4");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Missingness Diagnostics"));
}

#[test]
fn test_unknown_outcome() {
    let mut cmd = panel_command_with_outcome("diagnose", "nope");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Column not found: nope"));
}

#[test]
fn test_invalid_neighbor_count() {
    let mut cmd = panel_command("impute");
    cmd.arg("--k-neighbors").arg("0");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_missing_data_file() {
    let mut cmd = Command::cargo_bin("missing-panel").unwrap();
    cmd.arg("diagnose").arg("--data").arg("tests/data/absent.csv");

    cmd.assert().failure().stderr(predicate::str::contains("Error"));
}

#[test]
fn test_json_export() {
    let path = std::env::temp_dir().join(format!("missing_panel_report_{}.json", std::process::id()));
    let mut cmd = panel_command("diagnose");
    cmd.arg("--output-json").arg(&path);

    cmd.assert().success();

    let text = std::fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["integrity"].as_array().unwrap().len(), 2);
    assert_eq!(json["variants"].as_array().unwrap().len(), 4);
    std::fs::remove_file(&path).ok();
}
