//! End-to-end tests of the command-line surface.
//!
//! None of these reach a provider: they cover offline commands and the
//! paths that finish before any request is made.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

const API_KEY_VARS: [&str; 3] = ["GOOGLE_API_KEY", "GROQ_API_KEY", "MARITACA_API_KEY"];

/// A `mergebench` command isolated from the caller's environment.
#[allow(deprecated)]
fn mergebench_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("mergebench").expect("Failed to find mergebench binary");
    cmd.current_dir(dir)
        .env_remove("DEFAULT_LLM_PROVIDER")
        .env_remove("DEFAULT_LLM_MODEL")
        .env_remove("RUST_LOG");
    for var in API_KEY_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn dataset_line(id: u64, filename: &str, resolution: &str) -> String {
    json!({
        "id": id,
        "commit_sha": format!("sha{id}"),
        "repository_name": "elastic/elasticsearch",
        "filename": filename,
        "commit_message": format!("Merge branch {id}"),
        "conflict_tuple": {
            "a_content": "int a = 1;",
            "b_content": "int a = 2;",
            "base_content": "int a = 0;",
            "resolution": resolution,
        }
    })
    .to_string()
}

fn write_dataset(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("conflicts.jsonl");
    let lines = [
        dataset_line(1, "src/Main.java", "int a = 1;"),
        dataset_line(2, "src/Other.java", "int a = 3;"),
    ];
    fs::write(&path, lines.join("\n")).expect("Failed to write dataset");
    path
}

fn write_results(path: &Path, model: &str, records: Value) {
    let count = records.as_array().map_or(0, Vec::len);
    let file = json!({
        "metadata": {
            "provider": "google",
            "model": model,
            "timestamp": "2025-03-11T07:19:12.000Z",
            "total_records": count,
            "is_checkpoint": false
        },
        "results": records
    });
    fs::write(path, serde_json::to_string_pretty(&file).expect("serialize"))
        .expect("Failed to write results");
}

fn read_json(path: &Path) -> Value {
    let content = fs::read_to_string(path).expect("Failed to read output");
    serde_json::from_str(&content).expect("Output is not valid JSON")
}

#[test]
fn test_help_lists_subcommands() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    mergebench_cmd(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("triage"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("evaluate"))
        .stdout(predicate::str::contains("extract"));
}

#[test]
fn test_merge_orders_by_smallest_id() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let first = temp_dir.path().join("later.json");
    let second = temp_dir.path().join("earlier.json");
    let output = temp_dir.path().join("merged").join("all.json");
    write_results(
        &first,
        "gemini-2.0-flash",
        json!([
            {"id": 5, "commit_sha": "e", "conflict_resolution": "x"},
            {"id": 6, "commit_sha": "f", "conflict_resolution": "y"}
        ]),
    );
    write_results(
        &second,
        "gemini-2.0-flash",
        json!([
            {"id": 1, "commit_sha": "a", "conflict_resolution": "z"},
            {"id": 2, "commit_sha": "b", "conflict_resolution": "Erro ao gerar: timeout"}
        ]),
    );

    mergebench_cmd(temp_dir.path())
        .args(["merge"])
        .arg(&first)
        .arg(&second)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("4 records"));

    let merged = read_json(&output);
    let ids: Vec<u64> = merged["results"]
        .as_array()
        .expect("results array")
        .iter()
        .filter_map(|r| r["id"].as_u64())
        .collect();
    assert_eq!(ids, vec![1, 2, 5, 6]);
    assert_eq!(merged["metadata"]["total_records"], 4);
    assert_eq!(merged["metadata"]["is_checkpoint"], false);
    assert_eq!(merged["results"][1]["conflict_resolution"], "Erro ao gerar: timeout");
}

#[test]
fn test_merge_rejects_different_models() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let first = temp_dir.path().join("a.json");
    let second = temp_dir.path().join("b.json");
    let output = temp_dir.path().join("merged.json");
    write_results(&first, "gemini-2.0-flash", json!([]));
    write_results(&second, "sabia-3", json!([]));

    mergebench_cmd(temp_dir.path())
        .arg("merge")
        .arg(&first)
        .arg(&second)
        .arg("-o")
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("models are different"));

    assert!(!output.exists());
}

#[test]
fn test_generate_without_api_key_fails_before_processing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dataset = write_dataset(temp_dir.path());
    let output_dir = temp_dir.path().join("out");

    mergebench_cmd(temp_dir.path())
        .args(["generate", "--provider", "google", "--input"])
        .arg(&dataset)
        .arg("--output-dir")
        .arg(&output_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOOGLE_API_KEY"));

    assert!(!output_dir.exists());
}

#[test]
fn test_generate_rejects_unknown_provider() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dataset = write_dataset(temp_dir.path());

    mergebench_cmd(temp_dir.path())
        .args(["generate", "--provider", "openai", "--input"])
        .arg(&dataset)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported provider"));
}

#[test]
fn test_generate_rejects_zero_checkpoint_interval() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dataset = write_dataset(temp_dir.path());
    let output_dir = temp_dir.path().join("out");

    mergebench_cmd(temp_dir.path())
        .env("GOOGLE_API_KEY", "test-key")
        .args(["generate", "--provider", "google", "--checkpoint-interval", "0"])
        .arg("--input")
        .arg(&dataset)
        .arg("--output-dir")
        .arg(&output_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--checkpoint-interval"));

    assert!(!output_dir.exists());
}

#[test]
fn test_generate_empty_window_writes_final_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dataset = write_dataset(temp_dir.path());
    let output_dir = temp_dir.path().join("out");

    mergebench_cmd(temp_dir.path())
        .env("GOOGLE_API_KEY", "test-key")
        .args(["generate", "--provider", "google", "--max-requests", "0", "--wait-time", "0"])
        .arg("--input")
        .arg(&dataset)
        .arg("--output-dir")
        .arg(&output_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 attempted"));

    let files: Vec<_> = fs::read_dir(&output_dir)
        .expect("output dir")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().and_then(|n| n.to_str()).unwrap_or_default();
    assert!(name.starts_with("solved_conflicts_gemini-2.0-flash_"));
    assert!(!name.contains("_checkpoint_"));

    let saved = read_json(&files[0]);
    assert_eq!(saved["metadata"]["is_checkpoint"], false);
    assert_eq!(saved["metadata"]["repository_name"], "elastic/elasticsearch");
    assert_eq!(saved["results"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_triage_without_failures_changes_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let results = temp_dir.path().join("solved.json");
    write_results(
        &results,
        "gemini-2.0-flash",
        json!([{"id": 1, "commit_sha": "a", "conflict_resolution": "ok"}]),
    );

    mergebench_cmd(temp_dir.path())
        .env("GOOGLE_API_KEY", "test-key")
        .args(["triage", "--provider", "google", "--input"])
        .arg(&results)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to do"));

    assert!(!temp_dir.path().join("solved_fixed.json").exists());
}

#[test]
fn test_evaluate_writes_reports() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dataset = write_dataset(temp_dir.path());
    let results = temp_dir.path().join("solved.json");
    let output_dir = temp_dir.path().join("evaluation");
    write_results(
        &results,
        "gemini-2.0-flash",
        json!([
            {"id": 1, "commit_sha": "sha1", "conflict_resolution": "```java\nint a = 1;\n```"},
            {"id": 2, "commit_sha": "sha2", "conflict_resolution": "Erro ao gerar: 429 quota"}
        ]),
    );

    mergebench_cmd(temp_dir.path())
        .arg("evaluate")
        .arg("--dataset")
        .arg(&dataset)
        .arg("--results")
        .arg(&results)
        .arg("--output-dir")
        .arg(&output_dir)
        .args(["--name", "elastic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total conflicts evaluated: 1"));

    let records = read_json(&output_dir.join("elastic-resolution_evaluation.json"));
    assert_eq!(records[0]["id"], 1);
    assert_eq!(records[0]["exact_match"], true);
    assert_eq!(records[0]["resolution_approach"], "chose_a");

    let summary = read_json(&output_dir.join("elastic-file_extension_summary.json"));
    assert_eq!(summary[0]["file_extension"], "java");
    assert_eq!(summary[0]["count"], 1);
}

#[test]
fn test_extract_filters_and_renumbers() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("all.jsonl");
    let output = temp_dir.path().join("eclipse.jsonl");
    let lines = [
        json!({"id": 10, "repository_name": "eclipse/jetty"}).to_string(),
        json!({"id": 11, "repository_name": "elastic/elasticsearch"}).to_string(),
        json!({"id": 12, "repository_name": "Eclipse/che"}).to_string(),
    ];
    fs::write(&input, lines.join("\n")).expect("Failed to write input");

    mergebench_cmd(temp_dir.path())
        .args(["extract", "--keyword", "eclipse/", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 records"));

    let content = fs::read_to_string(&output).expect("Failed to read output");
    let ids: Vec<u64> = content
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| value["id"].as_u64())
        .collect();
    assert_eq!(ids, vec![1, 2]);
}
