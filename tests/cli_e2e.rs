//! End-to-end CLI tests for the papertag binary.

mod support;

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use support::write_pdf;

/// Command isolated from the user's config and log settings.
fn papertag(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("papertag").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("RUST_LOG")
        .env_remove("PAPERTAG_GEMINI_API_KEY");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    papertag(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Keyword tagging"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    papertag(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("papertag"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    papertag(home.path())
        .args(["run", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_add_run_and_query_tags() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("papers.db");
    let pdf = write_pdf(
        home.path(),
        "graph_paper.pdf",
        &["Graph networks learn graph structure and graph networks scale"],
    );

    papertag(home.path())
        .arg("--database")
        .arg(&db)
        .arg("add")
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains("1\tgraph paper"));

    papertag(home.path())
        .arg("--database")
        .arg(&db)
        .args(["run", "-c", "2", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 tagged"));

    papertag(home.path())
        .arg("--database")
        .arg(&db)
        .args(["tags", "--paper", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("graph\n"))
        .stdout(predicate::str::contains("networks\n"));

    papertag(home.path())
        .arg("--database")
        .arg(&db)
        .args(["papers", "--tag", "  GRAPH "])
        .assert()
        .success()
        .stdout(predicate::str::contains("1\tgraph paper\tdisabled"));
}

#[test]
fn test_add_missing_file_fails() {
    let home = TempDir::new().unwrap();
    papertag(home.path())
        .arg("--database")
        .arg(home.path().join("papers.db"))
        .args(["add", "does-not-exist.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read"));
}

#[test]
fn test_retry_reports_count() {
    let home = TempDir::new().unwrap();
    papertag(home.path())
        .arg("--database")
        .arg(home.path().join("papers.db"))
        .arg("retry")
        .assert()
        .success()
        .stdout(predicate::str::contains("requeued 0 failed jobs"));
}

#[test]
fn test_extract_prints_top_terms() {
    let home = TempDir::new().unwrap();
    let pdf = write_pdf(
        home.path(),
        "kernels.pdf",
        &["Kernel methods and kernel regression with kernel tricks"],
    );

    papertag(home.path())
        .args(["extract", "-k", "1"])
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::eq("kernel\t3\n"));
}

#[test]
fn test_extract_corrupt_pdf_fails() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("bad.pdf");
    std::fs::write(&path, "not a pdf").unwrap();

    papertag(home.path())
        .arg("extract")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("document_unreadable"));
}

#[test]
fn test_unknown_config_key_fails() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.toml");
    std::fs::write(&config, "colour = \"blue\"\n").unwrap();

    papertag(home.path())
        .arg("--config")
        .arg(&config)
        .arg("retry")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_summarize_without_key_fails() {
    let home = TempDir::new().unwrap();
    papertag(home.path())
        .arg("--database")
        .arg(home.path().join("papers.db"))
        .args(["run", "--summarize"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}
