//! Account and session tests

mod common;

use common::{bowler, bowler_anon, workspace};
use predicates::prelude::*;
use std::path::Path;

fn signup(dir: &Path, user: &str, password: &str) {
    bowler_anon(dir)
        .args(["auth", "signup", user, "--password", password, "--email", "a@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created account"));
}

#[test]
fn test_signup_login_whoami_logout() {
    let tmp = workspace();
    signup(tmp.path(), "alice", "correct horse");

    bowler_anon(tmp.path())
        .args(["auth", "login", "alice", "--password", "correct horse"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in as alice"));

    bowler_anon(tmp.path())
        .args(["--format", "id", "auth", "whoami"])
        .assert()
        .success()
        .stdout("alice\n");

    bowler_anon(tmp.path())
        .args(["auth", "whoami"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a@example.com"));

    bowler_anon(tmp.path())
        .args(["auth", "logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out"));

    bowler_anon(tmp.path())
        .args(["auth", "whoami"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}

#[test]
fn test_session_user_owns_records() {
    let tmp = workspace();
    signup(tmp.path(), "carol", "password1");
    bowler_anon(tmp.path())
        .args(["auth", "login", "carol", "--password", "password1"])
        .assert()
        .success();

    bowler_anon(tmp.path())
        .args(["bowler", "new", "Carol's bowler"])
        .assert()
        .success();

    bowler_anon(tmp.path())
        .args(["admin", "kv-list", "user:carol:bowler:"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user:carol:bowler:BWL-"));
}

#[test]
fn test_user_flag_overrides_session() {
    let tmp = workspace();
    signup(tmp.path(), "carol", "password1");
    bowler_anon(tmp.path())
        .args(["auth", "login", "carol", "--password", "password1"])
        .assert()
        .success();

    bowler_anon(tmp.path())
        .args(["--user", "dave", "--format", "id", "auth", "whoami"])
        .assert()
        .success()
        .stdout("dave\n");
}

#[test]
fn test_duplicate_signup_fails() {
    let tmp = workspace();
    signup(tmp.path(), "alice", "password1");

    bowler_anon(tmp.path())
        .args(["auth", "signup", "alice", "--password", "password2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_short_password_rejected() {
    let tmp = workspace();
    bowler_anon(tmp.path())
        .args(["auth", "signup", "alice", "--password", "short"])
        .assert()
        .failure();
}

#[test]
fn test_wrong_password_fails() {
    let tmp = workspace();
    signup(tmp.path(), "alice", "password1");

    bowler_anon(tmp.path())
        .args(["auth", "login", "alice", "--password", "password2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid username or password"));

    bowler_anon(tmp.path())
        .args(["auth", "login", "nobody", "--password", "password2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid username or password"));
}

#[test]
fn test_password_is_not_stored_in_plain_text() {
    let tmp = workspace();
    signup(tmp.path(), "alice", "password1");

    let db = std::fs::read(tmp.path().join("bowler.db")).unwrap();
    let haystack = String::from_utf8_lossy(&db);
    assert!(!haystack.contains("password1"));
    assert!(haystack.contains("$pbkdf2-sha256$"));
}

#[test]
fn test_change_password() {
    let tmp = workspace();
    signup(tmp.path(), "alice", "password1");

    bowler(tmp.path())
        .args(["auth", "passwd", "--old", "password1", "--new", "password2"])
        .assert()
        .success();

    bowler_anon(tmp.path())
        .args(["auth", "login", "alice", "--password", "password1"])
        .assert()
        .failure();
    bowler_anon(tmp.path())
        .args(["auth", "login", "alice", "--password", "password2"])
        .assert()
        .success();
}

#[test]
fn test_update_profile_and_show_user() {
    let tmp = workspace();
    signup(tmp.path(), "alice", "password1");

    bowler(tmp.path())
        .args(["auth", "profile", "--first-name", "Alice", "--last-name", "Liddell"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Alice Liddell"));

    let output = bowler_anon(tmp.path())
        .args(["--format", "json", "auth", "user", "alice"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Liddell"));
    assert!(!stdout.contains("sha256"));
}
