//! Integration tests for top-level CLI behavior.

use std::process::Command;

fn run_revive(args: &[&str]) -> std::process::Output {
    let bin = env!("CARGO_BIN_EXE_revive");
    Command::new(bin)
        .args(args)
        .env_remove("REVIVE_RECORD")
        .env("REVIVE_LOG", "off")
        .output()
        .expect("failed to run revive binary")
}

#[test]
fn help_lists_every_subcommand() {
    let output = run_revive(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    for command in ["scan", "analyze", "resurrect", "commit", "create-pr"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}

#[test]
fn resurrect_help_shows_instructions_flag() {
    let output = run_revive(&["resurrect", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("--instructions"));
    assert!(stdout.contains("--verbose"));
}

#[test]
fn invalid_subcommand_exits_with_error() {
    let output = run_revive(&["nonsense"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("unrecognized subcommand"));
}

#[test]
fn non_github_url_is_rejected() {
    let output = run_revive(&["scan", "https://gitlab.com/acme/shop"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("Not a GitHub repository URL"));
    assert!(output.stdout.is_empty());
}

#[test]
fn create_pr_with_missing_file_list_fails() {
    let output = run_revive(&[
        "create-pr",
        "https://github.com/acme/shop",
        "--files",
        "/nonexistent/files.json",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("Failed to read /nonexistent/files.json"));
}
