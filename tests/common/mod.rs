//! Shared test helpers for integration tests
//!
//! Every helper runs the binary against a database inside a temp directory,
//! with no config file and no chat or email endpoints.

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

const ISOLATED_VARS: &[&str] = &[
    "BOWLER_USER",
    "BOWLER_PASSWORD",
    "BOWLER_CHAT_URL",
    "BOWLER_CHAT_MODEL",
    "BOWLER_CHAT_API_KEY",
    "BOWLER_EMAIL_URL",
    "BOWLER_EMAIL_API_KEY",
    "BOWLER_EMAIL_FROM",
    "BOWLER_LOG",
    "RUST_LOG",
];

/// A `bowler` command bound to the workspace in `dir`, acting for nobody
pub fn bowler_anon(dir: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("bowler"));
    for var in ISOLATED_VARS {
        cmd.env_remove(var);
    }
    cmd.env("BOWLER_DB", dir.join("bowler.db"))
        .env("BOWLER_CONFIG", dir.join("config.yaml"))
        .current_dir(dir);
    cmd
}

/// A `bowler` command acting for `alice`
pub fn bowler(dir: &Path) -> Command {
    bowler_as(dir, "alice")
}

/// A `bowler` command acting for `user`
pub fn bowler_as(dir: &Path, user: &str) -> Command {
    let mut cmd = bowler_anon(dir);
    cmd.env("BOWLER_USER", user);
    cmd
}

pub fn workspace() -> TempDir {
    TempDir::new().unwrap()
}

/// Create a bowler and return its full ID
pub fn create_bowler(dir: &Path, name: &str, group: Option<&str>) -> String {
    let mut cmd = bowler(dir);
    cmd.args(["--format", "id", "bowler", "new", name]);
    if let Some(group) = group {
        cmd.args(["--group", group]);
    }
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Add a metric with a few months of data
pub fn add_metric_with_data(dir: &Path, bowler_ref: &str, name: &str, rule: &str, rows: &[(&str, &str, &str)]) {
    bowler(dir)
        .args(["metric", "add", bowler_ref, name, "--rule", rule])
        .assert()
        .success();
    for &(month, actual, target) in rows {
        bowler(dir)
            .args(["metric", "set", bowler_ref, name, month, "--actual", actual, "--target", target])
            .assert()
            .success();
    }
}

/// Create an A3 case and return its full ID
pub fn create_a3(dir: &Path, title: &str, problem: Option<&str>) -> String {
    let mut cmd = bowler(dir);
    cmd.args(["--format", "id", "a3", "new", title]);
    if let Some(problem) = problem {
        cmd.args(["--problem", problem]);
    }
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
