//! Scheduled email job

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// An email waiting in the KV queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailJob {
    pub id: EntityId,

    pub user_id: String,

    pub recipients: Vec<String>,

    pub subject: String,

    pub body: String,

    /// When to send; unset means the next run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub sent: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,

    pub created: DateTime<Utc>,
}

impl EmailJob {
    pub fn new(
        user_id: impl Into<String>,
        recipients: Vec<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Mail),
            user_id: user_id.into(),
            recipients,
            subject: subject.into(),
            body: body.into(),
            send_at: None,
            sent: false,
            sent_at: None,
            created: Utc::now(),
        }
    }

    /// Unsent and either unscheduled or scheduled at/before `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.sent && self.send_at.map_or(true, |at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        let mut job = EmailJob::new("u", vec!["a@example.com".to_string()], "s", "b");
        assert!(job.is_due(now));

        job.send_at = Some(now + Duration::hours(1));
        assert!(!job.is_due(now));

        job.send_at = Some(now - Duration::minutes(1));
        assert!(job.is_due(now));

        job.sent = true;
        assert!(!job.is_due(now));
    }
}
