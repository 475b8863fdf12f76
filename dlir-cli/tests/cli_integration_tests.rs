//! Integration tests for DLIR CLI commands

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const FRIEND_POLICY: &str = r#"
% transitive friend access
user(alice). user(bob). photo(p1).
friend_of(alice, bob).
owner_of(bob, p1).
access(X, Z) :- user(X), photo(Z), friend_of(X, Y), owner_of(Y, Z).
access(alice, p1)?
"#;

fn program_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn dlir() -> Command {
    Command::cargo_bin("dlir").unwrap()
}

/// Test the version command
#[test]
fn test_cli_version() {
    dlir()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dlir"));
}

/// Test the help command
#[test]
fn test_cli_help() {
    dlir()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("eval"))
        .stdout(predicate::str::contains("query"));
}

#[test]
fn test_check_valid_program() {
    let file = program_file(FRIEND_POLICY);

    dlir()
        .arg("check")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("Clauses: 6"))
        .stdout(predicate::str::contains("Queries: 1"));
}

#[test]
fn test_check_lists_clauses() {
    let file = program_file(FRIEND_POLICY);

    dlir()
        .arg("check")
        .arg("--list")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("  friend_of(alice, bob)."))
        .stdout(predicate::str::contains(
            "  access(X, Z) :- user(X), photo(Z), friend_of(X, Y), owner_of(Y, Z).",
        ))
        .stdout(predicate::str::contains("  access(alice, p1)?"));
}

#[test]
fn test_check_reports_syntax_error() {
    let file = program_file("user(alice).\nEdge(a, b).\n");

    dlir()
        .arg("check")
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Syntax error at 2:1"))
        .stderr(predicate::str::contains("   2 | Edge(a, b)."));
}

#[test]
fn test_check_reports_negative_cycle() {
    let file = program_file("d(a).\np(X) :- d(X), not q(X).\nq(X) :- d(X), not p(X).\n");

    dlir()
        .arg("check")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not stratifiable"));
}

#[test]
fn test_check_missing_file() {
    dlir()
        .arg("check")
        .arg("/nonexistent/policy.dl")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn test_eval_prints_facts_and_answers() {
    let file = program_file(FRIEND_POLICY);

    dlir()
        .arg("eval")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("access(alice, p1)."))
        .stdout(predicate::str::contains("access(alice, p1)?"))
        .stdout(predicate::str::contains("yes"));
}

#[test]
fn test_eval_json_output() {
    let file = program_file(FRIEND_POLICY);

    let output = dlir()
        .arg("eval")
        .arg(file.path())
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let facts = value["facts"].as_array().unwrap();
    assert!(facts.iter().any(|f| f == "access(alice, p1)."));
    assert_eq!(value["queries"][0]["answer"]["holds"], true);
    assert_eq!(value["stats"]["derived_facts"], 1);
}

#[test]
fn test_eval_with_config() {
    let file = program_file(FRIEND_POLICY);
    let config = program_file("strategy = \"naive\"\nparallel = false\n");

    dlir()
        .arg("eval")
        .arg(file.path())
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("access(alice, p1)."));
}

#[test]
fn test_eval_budget_exceeded() {
    let file = program_file(FRIEND_POLICY);
    let config = program_file("max_facts = 2\n");

    dlir()
        .arg("eval")
        .arg(file.path())
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("fact limit of 2 exceeded"));
}

#[test]
fn test_query_bindings() {
    let file = program_file(FRIEND_POLICY);

    dlir()
        .arg("query")
        .arg(file.path())
        .arg("access(X, p1)")
        .assert()
        .success()
        .stdout(predicate::str::contains("{X = alice}"));
}

#[test]
fn test_query_denied() {
    let file = program_file(FRIEND_POLICY);

    dlir()
        .arg("query")
        .arg(file.path())
        .arg("access(bob, p1)")
        .assert()
        .success()
        .stdout(predicate::str::contains("no"));
}

#[test]
fn test_query_json() {
    let file = program_file(FRIEND_POLICY);

    let output = dlir()
        .args(["query", "--format", "json"])
        .arg(file.path())
        .arg("access(alice, Z)")
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["query"], "access(alice, Z)");
    assert_eq!(value["answer"]["bindings"][0]["Z"], "p1");
}

#[test]
fn test_query_policy_document() {
    let file = program_file(
        r#"{
            "datalog_subsets": "github_user(alice).",
            "datalog_objects": "repo(r1).",
            "datalog_relationships": "owner_of(alice, r1).",
            "datalog_actions": "access(X, Y) :- github_user(X), repo(Y), owner_of(X, Y)."
        }"#,
    );

    dlir()
        .arg("query")
        .arg("--policy")
        .arg(file.path())
        .arg("access(alice, r1)")
        .assert()
        .success()
        .stdout(predicate::str::contains("yes"));
}

#[test]
fn test_invalid_policy_document() {
    let file = program_file("{ not json");

    dlir()
        .arg("check")
        .arg("--policy")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid policy document"));
}
