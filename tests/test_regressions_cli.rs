use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::{TempDir, tempdir};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_log-sieve")
}

fn write_file(path: &Path, content: &str) {
    fs::write(path, content).expect("failed to write test file");
}

fn record(template: &str, parameter: &str, level: &str) -> String {
    serde_json::json!({
        "template": template,
        "parameters": [parameter],
        "time": "2026-01-01T08:00:00Z",
        "thread_id": 4,
        "process_id": 100,
        "level": level,
        "file": "service.rs",
    })
    .to_string()
}

/// Five records: two disk errors, a network error, and two info lines
fn records_file(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("records.jsonl");
    let lines = [
        record("disk {0} is full", "sda", "error"),
        record("service {0} started", "api", "info"),
        record("network {0} unreachable", "eth0", "error"),
        record("disk {0} is full", "sdb", "error"),
        record("request {0} served", "42", "info"),
    ];
    write_file(&path, &(lines.join("\n") + "\n"));
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(bin())
        .args(["--color", "never", "--quiet"])
        .args(args)
        .output()
        .expect("command should run")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_view_with_chained_filters_prints_matching_rows() {
    let dir = tempdir().expect("temp dir");
    let file = records_file(&dir);

    let output = run(&["view", file.to_str().expect("utf8 path"), "-f", "error", "-f", "disk"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("disk sda is full"));
    assert!(stdout.contains("disk sdb is full"));
    assert!(!stdout.contains("network"));
    assert!(stdout.contains("Showing rows 0..2 of 2 in view #2"));
}

#[test]
fn test_view_json_written_to_output_file() {
    let dir = tempdir().expect("temp dir");
    let file = records_file(&dir);
    let out = dir.path().join("rows.json");

    let output = run(&[
        "-F",
        "json",
        "-o",
        out.to_str().expect("utf8 path"),
        "view",
        file.to_str().expect("utf8 path"),
        "--filter",
        "error && !disk",
        "--tag",
        "3=eth0",
    ]);
    let rows = stdout_json(&output);
    assert_eq!(rows.as_array().map(Vec::len), Some(1));
    assert_eq!(rows[0]["text"], "network eth0 unreachable");
    assert_eq!(rows[0]["id"], 2);
    assert_eq!(rows[0]["tags"], serde_json::json!([3]));

    let written: Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("output file should exist"))
            .expect("output file should be JSON");
    assert_eq!(written, rows);
}

#[test]
fn test_view_respects_configured_columns_and_limit() {
    let dir = tempdir().expect("temp dir");
    let file = records_file(&dir);
    let config = dir.path().join("viewer.toml");
    write_file(
        &config,
        "[display]\nmax_rows = 2\nshow_columns = [\"Level\", \"Text\"]\n",
    );

    let output = run(&[
        "--config",
        config.to_str().expect("utf8 path"),
        "-F",
        "json",
        "view",
        file.to_str().expect("utf8 path"),
    ]);
    let rows = stdout_json(&output);
    let rows = rows.as_array().expect("array of rows");
    assert_eq!(rows.len(), 2);
    let keys: Vec<&str> = rows[0]
        .as_object()
        .expect("row object")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys.len(), 3);
    assert!(keys.contains(&"level") && keys.contains(&"text") && keys.contains(&"row"));
}

#[test]
fn test_find_backward_from_end() {
    let dir = tempdir().expect("temp dir");
    let file = records_file(&dir);

    let output = run(&[
        "-F",
        "json",
        "find",
        file.to_str().expect("utf8 path"),
        "-e",
        "disk",
        "--from",
        "99",
        "--backward",
    ]);
    let found = stdout_json(&output);
    assert_eq!(found["row"], 3);
    assert_eq!(found["record"], 3);

    let output = run(&["-F", "json", "find", file.to_str().expect("utf8 path"), "-e", "disk", "--from", "4"]);
    assert_eq!(stdout_json(&output)["row"], Value::Null);
}

#[test]
fn test_count_within_filtered_view() {
    let dir = tempdir().expect("temp dir");
    let file = records_file(&dir);

    let output = run(&["count", file.to_str().expect("utf8 path"), "-f", "error", "-e", "/sd[ab]/"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "2 of 3 rows");
}

#[test]
fn test_ingest_filter_skips_records() {
    let dir = tempdir().expect("temp dir");
    let file = records_file(&dir);

    let output = run(&["-F", "json", "count", file.to_str().expect("utf8 path"), "--ingest-filter", "info"]);
    let counts = stdout_json(&output);
    assert_eq!(counts["total"], 2);
}

#[test]
fn test_check_prints_tree() {
    let output = run(&["check", "a || b c"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("(or a (and b c))"), "stdout: {stdout}");
}

#[test]
fn test_check_reports_offset_of_error() {
    let output = run(&["check", "a && (b"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("       ^"), "stderr: {stderr}");
    assert!(stderr.contains("expected ')'"), "stderr: {stderr}");
}

#[test]
fn test_malformed_record_lines_are_skipped() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("mixed.jsonl");
    write_file(
        &path,
        &format!("{}\n{{broken\n{}\n", record("a {0}", "1", "info"), record("b {0}", "2", "warn")),
    );

    let output = run(&["-F", "json", "count", path.to_str().expect("utf8 path")]);
    assert_eq!(stdout_json(&output)["total"], 2);
}

#[test]
fn test_missing_record_file_fails() {
    let dir = tempdir().expect("temp dir");
    let output = run(&["view", dir.path().join("nope.jsonl").to_str().expect("utf8 path")]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.jsonl"));
}
