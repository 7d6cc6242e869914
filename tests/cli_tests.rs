// End-to-end CLI tests for the `biasgen` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_settings(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("settings.json");
    fs::write(
        &path,
        r#"{
            "problem_dimension": 2,
            "total_number_of_events": 200,
            "p_b": 0.5,
            "background_mu": [0.0, 0.0],
            "background_sigma": [1.0, 1.0],
            "theta": 0.0,
            "L": 6.0,
            "signal_sigma_scale": 1.0,
            "z_magnitude": 2.0,
            "alpha": 0.0,
            "scaling_factor": 1.0
        }"#,
    )
    .unwrap();
    path
}

#[test]
fn test_generate_writes_dataset_pair() {
    let temp_dir = TempDir::new().unwrap();
    let settings = write_settings(temp_dir.path());
    let output = temp_dir.path().join("out");

    Command::cargo_bin("biasgen")
        .unwrap()
        .args(["generate", "--settings"])
        .arg(&settings)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("dataset pair written to"));

    assert!(output.join("train/data/train.csv").exists());
    assert!(output.join("test/data/test.csv").exists());
    assert!(output.join("train/labels/train.labels").exists());
    assert!(output.join("settings/settings.json").exists());
}

#[test]
fn test_generate_runs_writes_indexed_pairs() {
    let temp_dir = TempDir::new().unwrap();
    let settings = write_settings(temp_dir.path());
    let output = temp_dir.path().join("out");

    Command::cargo_bin("biasgen")
        .unwrap()
        .args(["generate", "--runs", "2", "--settings"])
        .arg(&settings)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 dataset pairs written to"));

    assert!(output.join("train/data/train_0.csv").exists());
    assert!(output.join("train/data/train_1.csv").exists());
    assert!(output.join("test/labels/test_1.labels").exists());
}

#[test]
fn test_generate_is_deterministic_for_a_seed() {
    let temp_dir = TempDir::new().unwrap();
    let settings = write_settings(temp_dir.path());
    let first = temp_dir.path().join("a");
    let second = temp_dir.path().join("b");

    for output in [&first, &second] {
        Command::cargo_bin("biasgen")
            .unwrap()
            .args(["generate", "--seed", "7", "--settings"])
            .arg(&settings)
            .arg("--output")
            .arg(output)
            .assert()
            .success();
    }

    let csv_a = fs::read_to_string(first.join("train/data/train.csv")).unwrap();
    let csv_b = fs::read_to_string(second.join("train/data/train.csv")).unwrap();
    assert_eq!(csv_a, csv_b);
}

#[test]
fn test_evaluate_reports_accuracy() {
    let temp_dir = TempDir::new().unwrap();
    let settings = write_settings(temp_dir.path());

    Command::cargo_bin("biasgen")
        .unwrap()
        .args([
            "evaluate",
            "--model",
            "linear-discriminant",
            "--preprocess",
            "translation",
            "--settings",
        ])
        .arg(&settings)
        .assert()
        .success()
        .stdout(predicate::str::contains("accuracy:"))
        .stdout(predicate::str::contains("signal accuracy:"))
        .stdout(predicate::str::contains("background accuracy:"));
}

#[test]
fn test_missing_settings_file_fails() {
    Command::cargo_bin("biasgen")
        .unwrap()
        .args(["generate", "--settings", "no-such.json", "--output", "out"])
        .assert()
        .failure();
}

#[test]
fn test_incomplete_settings_fail_validation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("partial.json");
    fs::write(
        &path,
        r#"{"problem_dimension": 2, "total_number_of_events": 100, "p_b": 0.5}"#,
    )
    .unwrap();

    Command::cargo_bin("biasgen")
        .unwrap()
        .args(["generate", "--settings"])
        .arg(&path)
        .arg("--output")
        .arg(temp_dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing settings key"));
}

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("biasgen")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("evaluate"));
}
