//! CLI argument parsing tests for nldump.
//!
//! These only exercise paths that exit before a socket is opened.

use assert_cmd::Command;
use predicates::prelude::*;

fn nldump_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nldump"))
}

#[test]
fn test_help() {
    nldump_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Print rtnetlink messages"))
        .stdout(predicate::str::contains("--all-nsid"))
        .stdout(predicate::str::contains("--dump"));
}

#[test]
fn test_help_lists_kinds() {
    nldump_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("neighbor"))
        .stdout(predicate::str::contains("netns"));
}

#[test]
fn test_version() {
    nldump_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nldump"));
}

#[test]
fn test_unknown_kind() {
    nldump_cmd()
        .args(["link", "qdisc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'qdisc'"));
}

#[test]
fn test_unknown_flag() {
    nldump_cmd()
        .arg("--bogus")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
