//! CLI integration tests for every subcommand.
//!
//! Uses `assert_cmd` to spawn the `optrace` binary and verify exit codes,
//! stdout content and stderr content.
//!
//! All tests set `current_dir` to the workspace root so that relative
//! paths to test fixtures resolve correctly.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const QUOTE: &str = "crates/cli/tests/fixtures/quote.json";

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/cli -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `optrace` binary, rooted at workspace.
fn optrace() -> Command {
    let mut cmd = cargo_bin_cmd!("optrace");
    cmd.current_dir(workspace_root());
    cmd
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write temp file");
    path
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    optrace()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Operation interpreter"));
}

#[test]
fn version_exits_0() {
    optrace()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("optrace"));
}

// ──────────────────────────────────────────────
// 2. Classify subcommand
// ──────────────────────────────────────────────

#[test]
fn classify_prints_kind_and_id() {
    optrace()
        .args(["classify", "{{@value.node-formula:abc}}"])
        .assert()
        .success()
        .stdout("formula abc\n");
}

#[test]
fn classify_json_reports_explicitness() {
    let output = optrace()
        .args(["--output", "json", "classify", "plain-name"])
        .output()
        .expect("run classify");
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(v["kind"], "field");
    assert_eq!(v["id"], "plain-name");
    assert_eq!(v["explicit"], false);
}

// ──────────────────────────────────────────────
// 3. Evaluate subcommand
// ──────────────────────────────────────────────

#[test]
fn evaluate_formula_variable() {
    optrace()
        .args(["evaluate", QUOTE, "--variable", "total", "--submission", "s1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("120\n"))
        .stdout(predicate::str::contains(
            "Quantity(4) * Unit price(30) = 120",
        ));
}

#[test]
fn evaluate_condition_variable_json() {
    let output = optrace()
        .args([
            "--output",
            "json",
            "evaluate",
            QUOTE,
            "--variable",
            "payable",
            "--submission",
            "s1",
        ])
        .output()
        .expect("run evaluate");
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(v["value"], "108");
    assert_eq!(v["sourceKind"], "condition");
    assert_eq!(v["trace"]["branchUsed"], "then");
    assert!(v["explanation"]
        .as_str()
        .unwrap()
        .ends_with("[THEN SELECTED] Result = 108"));
}

#[test]
fn evaluate_table_variable_uses_nearest_bracket() {
    optrace()
        .args(["evaluate", QUOTE, "--variable", "coef", "--submission", "s1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("R3-X3\n"))
        .stdout(predicate::str::contains("source: table (@table.t-coef)"));
}

#[test]
fn evaluate_fixed_variable() {
    optrace()
        .args([
            "--quiet",
            "evaluate",
            QUOTE,
            "--variable",
            "vat",
            "--submission",
            "s1",
        ])
        .assert()
        .success()
        .stdout("0.2\n");
}

#[test]
fn evaluate_with_overrides_file() {
    let dir = TempDir::new().unwrap();
    let overrides = write(&dir, "overrides.json", r#"{ "qty": "1" }"#);

    optrace()
        .args(["evaluate", QUOTE, "--variable", "payable", "--submission", "s1"])
        .arg("--overrides")
        .arg(&overrides)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("30\n"))
        .stdout(predicate::str::contains("[ELSE SELECTED]"));
}

#[test]
fn lazy_config_skips_the_untaken_branch() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "optrace.toml", "branch_resolution = \"lazy\"\n");

    optrace()
        .arg("--config")
        .arg(&config)
        .args(["evaluate", QUOTE, "--variable", "payable", "--submission", "s1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ELSE: not evaluated"));
}

#[test]
fn evaluate_unknown_variable_exits_1() {
    optrace()
        .args(["evaluate", QUOTE, "--variable", "qty", "--submission", "s1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no variable exposed by node 'qty'"));
}

#[test]
fn evaluate_missing_file_exits_1() {
    optrace()
        .args([
            "--output",
            "json",
            "evaluate",
            "nonexistent.json",
            "--variable",
            "total",
            "--submission",
            "s1",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("\"error\""));
}

// ──────────────────────────────────────────────
// 4. Interpret subcommand
// ──────────────────────────────────────────────

#[test]
fn interpret_single_reference() {
    optrace()
        .args(["interpret", QUOTE, "node-formula:f-discounted", "--submission", "s1"])
        .assert()
        .success()
        .stdout("108\nTotal(120) * 0.9 = 108\n");
}

#[test]
fn interpret_missing_entity_is_a_sentinel_not_an_error() {
    optrace()
        .args(["interpret", QUOTE, "condition:nope", "--submission", "s1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("∅\n"))
        .stdout(predicate::str::contains("condition not found: nope"));
}

// ──────────────────────────────────────────────
// 5. Check subcommand
// ──────────────────────────────────────────────

#[test]
fn check_valid_rule_base_exits_0() {
    optrace()
        .args(["check", QUOTE])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid (4 entities checked)"));
}

#[test]
fn check_invalid_rule_base_exits_1() {
    let dir = TempDir::new().unwrap();
    let doc = write(
        &dir,
        "broken.json",
        r#"{
            "conditions": [{ "id": "c1", "node_id": "n1", "name": "Broken",
                             "condition_set": { "branches": [{ "when": { "left": "x" } }] } }]
        }"#,
    );

    optrace()
        .arg("check")
        .arg(&doc)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("condition 'c1' (Broken)"))
        .stderr(predicate::str::contains("branches[0].when.op: missing"));
}
