//! Scheduled email queue
//!
//! Jobs live under `email:<id>`. Each run scans every job, sends the unsent
//! ones that are due and marks them sent. A failed send is logged and the job
//! stays unsent for the next run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::entities::email::EmailJob;
use crate::store::keys::{email_key, validate_user_id, EMAIL_PREFIX};
use crate::store::{put_json, scan_prefix, KvStore, StoreError};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Email service is not configured (set BOWLER_EMAIL_URL and BOWLER_EMAIL_API_KEY)")]
    NotConfigured,

    #[error("Email request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Request to queue an email
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub user_id: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub send_at: Option<DateTime<Utc>>,
}

/// Outcome of one queue run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub scanned: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Something that delivers an email job
pub trait EmailSender {
    fn send(&self, job: &EmailJob) -> Result<(), EmailError>;
}

/// Posts jobs to a transactional email HTTP API
#[derive(Debug, Clone)]
pub struct HttpEmailSender {
    endpoint: String,
    api_key: String,
    from: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

impl HttpEmailSender {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Result<Self, EmailError> {
        let endpoint = endpoint.into();
        let api_key = api_key.into();
        if endpoint.trim().is_empty() || api_key.trim().is_empty() {
            return Err(EmailError::NotConfigured);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()?;
        Ok(Self {
            endpoint,
            api_key,
            from: from.into(),
            client,
        })
    }
}

impl EmailSender for HttpEmailSender {
    fn send(&self, job: &EmailJob) -> Result<(), EmailError> {
        let body = OutgoingEmail {
            from: &self.from,
            to: &job.recipients,
            subject: &job.subject,
            html: &job.body,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmailError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Logs jobs instead of sending them
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSender;

impl EmailSender for DryRunSender {
    fn send(&self, job: &EmailJob) -> Result<(), EmailError> {
        info!(id = %job.id, to = ?job.recipients, subject = %job.subject, "dry run: email not sent");
        Ok(())
    }
}

fn looks_like_address(addr: &str) -> bool {
    match addr.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Validate and queue an email
pub fn schedule_email<S: KvStore + ?Sized>(store: &S, request: ScheduleRequest) -> Result<EmailJob, EmailError> {
    validate_user_id(&request.user_id).map_err(EmailError::InvalidInput)?;

    let recipients: Vec<String> = request
        .recipients
        .iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    if recipients.is_empty() {
        return Err(EmailError::InvalidInput("At least one recipient is required".to_string()));
    }
    if let Some(bad) = recipients.iter().find(|r| !looks_like_address(r)) {
        return Err(EmailError::InvalidInput(format!("Invalid email address: {}", bad)));
    }
    if request.subject.trim().is_empty() {
        return Err(EmailError::InvalidInput("Subject cannot be empty".to_string()));
    }

    let mut job = EmailJob::new(request.user_id, recipients, request.subject.trim(), request.body);
    job.send_at = request.send_at;
    put_json(store, &email_key(&job.id.to_string()), &job)?;
    info!(id = %job.id, send_at = ?job.send_at, "email scheduled");
    Ok(job)
}

/// Send every due job
pub fn run_due<S, E>(store: &S, sender: &E, now: DateTime<Utc>) -> Result<RunReport, EmailError>
where
    S: KvStore + ?Sized,
    E: EmailSender + ?Sized,
{
    let jobs: Vec<(String, EmailJob)> = scan_prefix(store, EMAIL_PREFIX)?;
    let mut report = RunReport {
        scanned: jobs.len(),
        ..Default::default()
    };

    for (key, mut job) in jobs {
        if !job.is_due(now) {
            continue;
        }
        match sender.send(&job) {
            Ok(()) => {
                job.sent = true;
                job.sent_at = Some(now);
                put_json(store, &key, &job)?;
                info!(id = %job.id, "email sent");
                report.sent += 1;
            }
            Err(e) => {
                warn!(id = %job.id, "Failed to send email: {}", e);
                report.failed += 1;
            }
        }
    }

    debug!(scanned = report.scanned, sent = report.sent, failed = report.failed, "email run complete");
    Ok(report)
}

/// Queued jobs, optionally for one user, in send order
pub fn list_jobs<S: KvStore + ?Sized>(store: &S, user_id: Option<&str>) -> Result<Vec<EmailJob>, EmailError> {
    let mut jobs: Vec<EmailJob> = scan_prefix::<EmailJob, S>(store, EMAIL_PREFIX)?
        .into_iter()
        .map(|(_, job)| job)
        .filter(|job| user_id.map_or(true, |u| job.user_id == u))
        .collect();
    jobs.sort_by_key(|job| (job.send_at.unwrap_or(job.created), job.created));
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKv;
    use chrono::Duration as ChronoDuration;
    use mockito::{Matcher, Server};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSender {
        sent: RefCell<Vec<String>>,
        fail_subject: Option<String>,
    }

    impl EmailSender for RecordingSender {
        fn send(&self, job: &EmailJob) -> Result<(), EmailError> {
            if self.fail_subject.as_deref() == Some(job.subject.as_str()) {
                return Err(EmailError::Status {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            self.sent.borrow_mut().push(job.subject.clone());
            Ok(())
        }
    }

    fn request(subject: &str, send_at: Option<DateTime<Utc>>) -> ScheduleRequest {
        ScheduleRequest {
            user_id: "alice".to_string(),
            recipients: vec!["team@example.com".to_string()],
            subject: subject.to_string(),
            body: "<p>Monthly review</p>".to_string(),
            send_at,
        }
    }

    #[test]
    fn test_schedule_validation() {
        let store = MemoryKv::new();
        let mut r = request("Review", None);
        r.recipients = vec!["  ".to_string()];
        assert!(matches!(schedule_email(&store, r), Err(EmailError::InvalidInput(_))));

        let mut r = request("Review", None);
        r.recipients = vec!["not-an-address".to_string()];
        assert!(matches!(schedule_email(&store, r), Err(EmailError::InvalidInput(_))));

        assert!(matches!(
            schedule_email(&store, request("   ", None)),
            Err(EmailError::InvalidInput(_))
        ));
        assert!(store.is_empty());

        let job = schedule_email(&store, request("Review", None)).unwrap();
        assert!(store.get(&email_key(&job.id.to_string())).unwrap().is_some());
    }

    #[test]
    fn test_run_due_sends_only_due_jobs() {
        let store = MemoryKv::new();
        let now = Utc::now();
        schedule_email(&store, request("unset", None)).unwrap();
        schedule_email(&store, request("past", Some(now - ChronoDuration::hours(1)))).unwrap();
        schedule_email(&store, request("future", Some(now + ChronoDuration::hours(1)))).unwrap();

        let sender = RecordingSender::default();
        let report = run_due(&store, &sender, now).unwrap();
        assert_eq!(report, RunReport { scanned: 3, sent: 2, failed: 0 });

        let mut sent = sender.sent.borrow().clone();
        sent.sort();
        assert_eq!(sent, vec!["past", "unset"]);

        // Already-sent jobs are not sent again
        let again = run_due(&store, &sender, now).unwrap();
        assert_eq!(again.sent, 0);
        assert_eq!(sender.sent.borrow().len(), 2);
    }

    #[test]
    fn test_failed_send_stays_unsent() {
        let store = MemoryKv::new();
        let now = Utc::now();
        schedule_email(&store, request("flaky", None)).unwrap();

        let failing = RecordingSender {
            fail_subject: Some("flaky".to_string()),
            ..Default::default()
        };
        let report = run_due(&store, &failing, now).unwrap();
        assert_eq!(report.failed, 1);
        assert!(!list_jobs(&store, None).unwrap()[0].sent);

        let working = RecordingSender::default();
        assert_eq!(run_due(&store, &working, now).unwrap().sent, 1);
        let jobs = list_jobs(&store, None).unwrap();
        assert!(jobs[0].sent);
        assert_eq!(jobs[0].sent_at, Some(now));
    }

    #[test]
    fn test_list_jobs_filters_by_user() {
        let store = MemoryKv::new();
        schedule_email(&store, request("mine", None)).unwrap();
        let mut other = request("theirs", None);
        other.user_id = "bob".to_string();
        schedule_email(&store, other).unwrap();

        assert_eq!(list_jobs(&store, None).unwrap().len(), 2);
        let mine = list_jobs(&store, Some("alice")).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].subject, "mine");
    }

    #[test]
    fn test_http_sender_posts_expected_body() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/emails")
            .match_header("authorization", "Bearer key-123")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "from": "bowler@example.com",
                "to": ["team@example.com"],
                "subject": "Review",
                "html": "<p>Monthly review</p>"
            })))
            .with_status(200)
            .with_body(r#"{"id":"abc"}"#)
            .create();

        let sender =
            HttpEmailSender::new(format!("{}/emails", server.url()), "key-123", "bowler@example.com").unwrap();
        let job = EmailJob::new(
            "alice",
            vec!["team@example.com".to_string()],
            "Review",
            "<p>Monthly review</p>",
        );
        sender.send(&job).unwrap();
        mock.assert();
    }

    #[test]
    fn test_http_sender_error_status() {
        let mut server = Server::new();
        let _mock = server.mock("POST", "/emails").with_status(422).with_body("bad").create();

        let sender = HttpEmailSender::new(format!("{}/emails", server.url()), "k", "f@example.com").unwrap();
        let job = EmailJob::new("alice", vec!["a@example.com".to_string()], "s", "b");
        assert!(matches!(
            sender.send(&job),
            Err(EmailError::Status { status: 422, .. })
        ));
    }

    #[test]
    fn test_http_sender_requires_config() {
        assert!(matches!(
            HttpEmailSender::new("", "k", "f"),
            Err(EmailError::NotConfigured)
        ));
    }
}
