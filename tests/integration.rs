//! Integration tests for complexity-eval CLI and library.
//!
//! These tests verify end-to-end functionality including:
//! - Dataset loading feeds the sampler
//! - Sampled subsets round-trip through the dataset file format
//! - Judged results aggregate and report correctly
//! - CLI commands exit with the right status

#![allow(clippy::unwrap_used)]
#![allow(clippy::uninlined_format_args)]

use complexity_eval::{
    aggregate, compare, BalancedSampler, Dataset, EvaluationResult, ExperimentConfig,
    ReportBuilder, ResultsFile, SamplerConfig, SecondPassPriority, StatConfig,
};
use std::path::Path;
use std::process::Command;

fn write_dataset(dir: &Path, classes: &[(&str, usize)]) -> std::path::PathBuf {
    let mut samples = Vec::new();
    for (label, count) in classes {
        for _ in 0..*count {
            let id = samples.len();
            samples.push(serde_json::json!({
                "id": id,
                "case": "case_2",
                "code_id": "CODE_1",
                "call_path": format!("main->solve(int)->kernel_{id}"),
                "function_name": format!("kernel_{id}"),
                "ground_truth": label,
                "source_file": "code_1.cpp"
            }));
        }
    }
    let path = dir.join("dataset.json");
    std::fs::write(&path, serde_json::to_string(&serde_json::json!({ "samples": samples })).unwrap())
        .unwrap();
    path
}

// ============================================================================
// Library Integration Tests
// ============================================================================

#[test]
fn test_sample_from_loaded_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dataset(dir.path(), &[("n^(1)", 5), ("p^(1) * n^(1)", 50)]);

    let dataset = Dataset::load(&path).unwrap();
    let subset = complexity_eval::sample(&dataset, 10, 42).unwrap();

    assert_eq!(subset.count("n^(1)"), 5);
    assert_eq!(subset.count("p^(1) * n^(1)"), 5);
}

#[test]
fn test_sampled_dataset_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dataset(dir.path(), &[("a", 12), ("b", 3), ("c", 40)]);
    let dataset = Dataset::load(&path).unwrap();

    let subset = BalancedSampler::with_config(SamplerConfig {
        seed: 7,
        priority: SecondPassPriority::Absolute,
        ..SamplerConfig::default()
    })
    .sample(&dataset, 20)
    .unwrap();
    let counts: Vec<usize> = ["a", "b", "c"].iter().map(|c| subset.count(c)).collect();

    let out = dir.path().join("sampled").join("test.json");
    subset.into_dataset(7).save(&out, Some(true)).unwrap();
    let reloaded = Dataset::load(&out).unwrap();

    assert_eq!(reloaded.len(), 20);
    let by_class = reloaded.by_class();
    assert_eq!(by_class["a"].len(), counts[0]);
    assert_eq!(by_class["b"].len(), 3);
    assert_eq!(by_class["c"].len(), counts[2]);
}

#[test]
fn test_judge_and_aggregate_pipeline() {
    let answers = [
        ("n^(1)", "Complexity: n^(1)"),
        ("n^(1)", "n^(2)"),
        ("p^(1/4) * log2(p)^(1)", "log2(p) * p^0.25"),
        ("constant", "O(1)"),
        ("n^(3/2)", "the answer depends on the input"),
    ];
    let results: Vec<EvaluationResult> = answers
        .iter()
        .enumerate()
        .map(|(i, (truth, pred))| EvaluationResult::judge(i, truth, pred))
        .collect();

    let summary = aggregate(&results);
    assert_eq!(summary.overall.correct, 3);
    assert_eq!(summary.overall.total, 5);
    assert_eq!(summary.per_class["n^(1)"].accuracy(), Some(0.5));
    assert_eq!(summary.per_class["n^(3/2)"].accuracy(), Some(0.0));
    assert_eq!(summary.per_class.len(), 4);
}

#[test]
fn test_report_from_saved_results() {
    let dir = tempfile::tempdir().unwrap();
    let truths = ["n^(1)", "p^(1)", "log2(p)^(1)", "n^(2)"];

    for (model, wrong_every) in [("model-a", 2_usize), ("model-b", 5)] {
        let results = (0..40)
            .map(|i| {
                let truth = truths[i % truths.len()];
                let pred = if i % wrong_every == 0 { "n^(3)" } else { truth };
                EvaluationResult::judge(i, truth, pred)
            })
            .collect();
        ResultsFile::new(model, results)
            .save(dir.path().join(format!("{model}.json")))
            .unwrap();
    }

    let report = ReportBuilder::new("Comparison")
        .with_stat_config(StatConfig {
            bootstrap_n: 200,
            ..StatConfig::default()
        })
        .load_glob(&format!("{}/*.json", dir.path().display()))
        .unwrap()
        .build();

    assert_eq!(report.models.len(), 2);
    assert_eq!(report.models[0].model, "model-b");
    assert_eq!(report.by_class.len(), 4);
    let markdown = report.to_markdown();
    assert!(markdown.contains("model-a"));
}

#[test]
fn test_config_drives_sampler() {
    let config = ExperimentConfig::from_yaml(
        "sampling:\n  target_total: 6\n  seed: 3\n  balanced: true\n",
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let dataset = Dataset::load(write_dataset(dir.path(), &[("a", 1), ("b", 10)])).unwrap();

    let subset = BalancedSampler::with_config(config.sampling.sampler_config())
        .sample(&dataset, config.sampling.target_total)
        .unwrap();
    assert_eq!(subset.count("a"), 1);
    assert_eq!(subset.count("b"), 5);
}

#[test]
fn test_spec_comparator_examples() {
    assert!(compare("n^(3/2)", "n^1.5"));
    assert!(compare("p^(1/4) * log2(p)", "log2(p)*p^(1/4)"));
    assert!(!compare("n^2", "n^1"));
    assert!(!compare("garbage(((", "n^1"));
}

// ============================================================================
// CLI Integration Tests
// ============================================================================

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_complexity-eval"))
}

#[test]
fn test_cli_help_command() {
    let output = cli().arg("--help").output().expect("Failed to execute CLI");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sample"), "Help should list sample command");
    assert!(stdout.contains("check"), "Help should list check command");
}

#[test]
fn test_cli_check_match_and_mismatch() {
    let matched = cli().args(["check", "n^1.5", "n^(3/2)"]).output().unwrap();
    assert!(matched.status.success());
    assert!(String::from_utf8_lossy(&matched.stdout).contains("MATCH"));

    let mismatched = cli().args(["check", "n^2", "n^(1)"]).output().unwrap();
    assert!(!mismatched.status.success());
    assert!(String::from_utf8_lossy(&mismatched.stdout).contains("NO MATCH"));
}

#[test]
fn test_cli_sample_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path(), &[("a", 5), ("b", 50)]);
    let out = dir.path().join("sampled.json");

    let output = cli()
        .args([
            "sample",
            "--dataset",
            dataset.to_str().unwrap(),
            "--target",
            "10",
            "--balanced",
            "--output",
            out.to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(Dataset::load(&out).unwrap().len(), 10);
}

#[test]
fn test_cli_generate_from_measurements() {
    let dir = tempfile::tempdir().unwrap();
    let case1 = dir.path().join("data").join("case_1");
    std::fs::create_dir_all(&case1).unwrap();
    std::fs::write(case1.join("call_path.txt"), "main->a\nmain->b(int)->MPI_Send\n").unwrap();
    std::fs::write(case1.join("complexity_bb.txt"), "n^(1)\nconstat\n").unwrap();
    let out = dir.path().join("dataset.json");

    let output = cli()
        .args([
            "generate",
            "--data-dir",
            dir.path().join("data").to_str().unwrap(),
            "--case",
            "1",
            "--output",
            out.to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let dataset = Dataset::load(&out).unwrap();
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.samples()[1].ground_truth, "constant");
    assert_eq!(dataset.samples()[1].function_name, "MPI_Send");
}

#[test]
fn test_cli_generate_without_data_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = cli()
        .args(["generate", "--data-dir", dir.path().to_str().unwrap(), "--case", "2"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_cli_sample_empty_dataset_fails() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("empty.json");
    std::fs::write(&dataset, r#"{"samples": []}"#).unwrap();

    let output = cli()
        .args(["sample", "--dataset", dataset.to_str().unwrap(), "--target", "10"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
