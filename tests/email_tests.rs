//! Scheduled email tests

mod common;

use common::{bowler, workspace};
use predicates::prelude::*;

#[test]
fn test_schedule_and_dry_run() {
    let tmp = workspace();

    bowler(tmp.path())
        .args(["email", "schedule", "--to", "ops@example.com", "--subject", "Weekly KPIs", "--body", "<p>hi</p>"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scheduled"));

    bowler(tmp.path())
        .args(["email", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queued"))
        .stdout(predicate::str::contains("Weekly KPIs"));

    bowler(tmp.path())
        .args(["email", "run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 sent, 0 failed"));

    bowler(tmp.path())
        .args(["email", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sent"));

    // Already sent, nothing left to do
    bowler(tmp.path())
        .args(["email", "run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 sent"));
}

#[test]
fn test_future_email_is_not_due() {
    let tmp = workspace();

    bowler(tmp.path())
        .args([
            "email",
            "schedule",
            "--to",
            "ops@example.com",
            "--subject",
            "Later",
            "--at",
            "2999-01-01T08:00:00Z",
        ])
        .assert()
        .success();

    bowler(tmp.path())
        .args(["email", "run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 sent, 0 failed (1 queued)"));
}

#[test]
fn test_schedule_rejects_bad_address() {
    let tmp = workspace();

    bowler(tmp.path())
        .args(["email", "schedule", "--to", "not-an-address", "--subject", "Hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid email address"));
}

#[test]
fn test_run_without_email_config_fails() {
    let tmp = workspace();

    bowler(tmp.path())
        .args(["email", "run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));
}

#[test]
fn test_run_sends_through_http_api() {
    let tmp = workspace();
    bowler(tmp.path())
        .args(["email", "schedule", "--to", "ops@example.com", "--subject", "Weekly KPIs"])
        .assert()
        .success();

    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/emails")
        .match_header("authorization", "Bearer re_test")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "to": ["ops@example.com"],
            "subject": "Weekly KPIs"
        })))
        .with_status(200)
        .with_body("{\"id\":\"1\"}")
        .create();

    bowler(tmp.path())
        .env("BOWLER_EMAIL_URL", format!("{}/emails", server.url()))
        .env("BOWLER_EMAIL_API_KEY", "re_test")
        .args(["email", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 sent, 0 failed"));
    mock.assert();
}

#[test]
fn test_failed_send_leaves_job_queued() {
    let tmp = workspace();
    bowler(tmp.path())
        .args(["email", "schedule", "--to", "ops@example.com", "--subject", "Weekly KPIs"])
        .assert()
        .success();

    let mut server = mockito::Server::new();
    server.mock("POST", "/emails").with_status(500).create();

    bowler(tmp.path())
        .env("BOWLER_EMAIL_URL", format!("{}/emails", server.url()))
        .env("BOWLER_EMAIL_API_KEY", "re_test")
        .args(["email", "run"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("0 sent, 1 failed"));

    bowler(tmp.path())
        .args(["email", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queued"));
}
