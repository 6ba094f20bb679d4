//! Smoke tests for the `sirq-sim` binary.

use std::fs;
use std::process::{Command, Output};

fn sirq_sim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sirq-sim"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("binary runs")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn run_then_inspect_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("day.zip");
    let agents = dir.path().join("agents.csv");
    let bundle_arg = bundle.to_str().unwrap();

    let out = sirq_sim(&[
        "run",
        "--preset",
        "rush_hour",
        "--seed",
        "7",
        "--policy",
        "fifo",
        "--agents-out",
        agents.to_str().unwrap(),
        "--bundle-out",
        bundle_arg,
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let report = stdout(&out);
    assert!(report.contains("--- KPI Report (FIFO) ---"));
    assert!(fs::read_to_string(&agents).unwrap().starts_with("id,profile"));

    let out = sirq_sim(&["inspect", bundle_arg]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("policy FIFO, seed 7"));
    assert!(text.contains("Revenue:"));
}

#[test]
fn watch_prints_json_lines() {
    let out = sirq_sim(&["run", "--watch", "360"]);
    assert!(out.status.success());
    let frames: Vec<serde_json::Value> = stdout(&out)
        .lines()
        .filter(|l| l.starts_with('{'))
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0]["tick"], 359);
    assert!(frames[0]["agents"].is_array());
}

#[test]
fn compare_prints_both_policies() {
    let out = sirq_sim(&["compare", "--capacity", "2"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("FIFO"));
    assert!(text.contains("SIRQ"));
    assert!(text.contains("Critical failures"));
}

#[test]
fn batch_writes_run_rows() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("runs.csv");
    let out = sirq_sim(&[
        "batch",
        "--runs",
        "2",
        "--traffic",
        "1.0,1.5",
        "--threads",
        "2",
        "--out",
        csv.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("Monte Carlo Summary (8 runs, 0 failed"));
    assert_eq!(fs::read_to_string(&csv).unwrap().lines().count(), 9);
}

#[test]
fn run_from_scenario_file() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/evening_rush.toml");
    let out = sirq_sim(&["run", "--scenario", path]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("--- KPI Report (SIRQ) ---"));

    let clash = sirq_sim(&["run", "--scenario", path, "--preset", "baseline"]);
    assert!(!clash.status.success());
}

#[test]
fn oversized_seed_fails_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let agents = dir.path().join("agents.csv");
    let bundle = dir.path().join("day.zip");
    let out = sirq_sim(&[
        "run",
        "--seed",
        "9223372036854775808",
        "--agents-out",
        agents.to_str().unwrap(),
        "--bundle-out",
        bundle.to_str().unwrap(),
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("run.seed"));
    assert!(!stdout(&out).contains("KPI Report"));
    assert!(!agents.exists());
    assert!(!bundle.exists());
}

#[test]
fn bad_arguments_fail() {
    assert!(!sirq_sim(&["run", "--preset", "nope"]).status.success());
    assert!(!sirq_sim(&["run", "--capacity", "0"]).status.success());
    assert!(!sirq_sim(&["run", "--policy", "lifo"]).status.success());
    assert!(!sirq_sim(&["inspect", "/nonexistent/bundle.zip"]).status.success());
}
