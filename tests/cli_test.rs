//! CLI surface tests
//!
//! Exercise the binary itself: argument validation must fail fast with
//! exit code 1 before any device or mount is touched.

use predicates::prelude::*;
use std::process::Command;

fn depthboot(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_depthboot"))
        .args(args)
        .output()
        .expect("Failed to execute depthboot")
}

#[test]
fn help_lists_subcommands() {
    let output = depthboot(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(predicate::str::contains("build").eval(&stdout));
    assert!(predicate::str::contains("doctor").eval(&stdout));
}

#[test]
fn invalid_username_exits_with_code_1() {
    let output = depthboot(&[
        "build",
        "--distro",
        "arch",
        "--username",
        "bad user!",
        "--password",
        "secret",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(predicate::str::contains("Invalid username").eval(&stderr));
}

#[test]
fn empty_password_exits_with_code_1() {
    let output = depthboot(&[
        "build",
        "--distro",
        "fedora",
        "--username",
        "localuser",
        "--password",
        "",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(predicate::str::contains("Password").eval(&stderr));
}

#[test]
fn unknown_distro_is_a_usage_error() {
    let output = depthboot(&[
        "build",
        "--distro",
        "slackware",
        "--password",
        "secret",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(predicate::str::contains("--distro").eval(&stderr));
}

#[test]
fn doctor_reports_tool_checks() {
    let output = depthboot(&["doctor"]);
    // Missing tools make doctor exit non-zero; either way it must report.
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(predicate::str::contains("Checking host tools").eval(&stdout));
}
