//! Notification composition and delivery records.
//!
//! Delivery is stubbed: composed notifications are appended to a durable
//! JSON log through a [`sink::NotificationSink`].

pub mod sink;
pub mod templates;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{ClassifiedStatus, MemberSummary, ScheduleStatus, User};

use self::templates::ManagerSummaryTemplate;

pub use self::sink::{JsonLogSink, LogPage, MemorySink, NotificationSink, SinkError};
pub use self::templates::Template;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to render {template} template: {source}")]
    Render {
        template: &'static str,
        #[source]
        source: askama::Error,
    },
}

/// Kind-specific part of a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    UserReminder {
        status_type: ScheduleStatus,
        course_ids: Vec<String>,
    },
    ManagerSummary {
        user_count: usize,
    },
}

/// One composed (and, once appended, "sent") message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub timestamp: NaiveDateTime,
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    #[serde(flatten)]
    pub kind: NotificationKind,
}

/// Builds notification records from classified statuses and team summaries.
#[derive(Debug, Clone)]
pub struct Composer {
    sender: String,
}

impl Composer {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }

    /// Compose a user notification for `courses` using the template for `status`.
    /// Returns `None` when there is nothing to report.
    pub fn user_notification(
        &self,
        user: &User,
        courses: &[ClassifiedStatus],
        status: ScheduleStatus,
        timestamp: NaiveDateTime,
    ) -> Result<Option<NotificationRecord>, ComposeError> {
        if courses.is_empty() {
            return Ok(None);
        }

        let template = Template::for_status(status);
        let body = template
            .body(user, courses)
            .map_err(|source| ComposeError::Render {
                template: template.name(),
                source,
            })?;
        let record = NotificationRecord {
            id: Uuid::new_v4(),
            timestamp,
            to: user.email.clone(),
            from: self.sender.clone(),
            subject: template.subject(user),
            body,
            kind: NotificationKind::UserReminder {
                status_type: status,
                course_ids: courses.iter().map(|c| c.course_id.clone()).collect(),
            },
        };
        info!(to = %record.to, subject = %record.subject, "Notification composed");
        Ok(Some(record))
    }

    /// Compose the team report for one manager. Members keep the order given.
    pub fn manager_notification(
        &self,
        manager_email: &str,
        members: &[MemberSummary],
        timestamp: NaiveDateTime,
    ) -> Result<Option<NotificationRecord>, ComposeError> {
        if members.is_empty() {
            return Ok(None);
        }

        let template = ManagerSummaryTemplate;
        let body = template
            .body(members)
            .map_err(|source| ComposeError::Render {
                template: "manager_summary",
                source,
            })?;
        let record = NotificationRecord {
            id: Uuid::new_v4(),
            timestamp,
            to: manager_email.to_string(),
            from: self.sender.clone(),
            subject: template.subject(members.len()),
            body,
            kind: NotificationKind::ManagerSummary {
                user_count: members.len(),
            },
        };
        info!(to = %record.to, subject = %record.subject, "Notification composed");
        Ok(Some(record))
    }

    /// One notification per status group, groups in first-seen order.
    pub fn digest(
        &self,
        user: &User,
        statuses: &[ClassifiedStatus],
        timestamp: NaiveDateTime,
    ) -> Result<Vec<NotificationRecord>, ComposeError> {
        let mut groups: IndexMap<ScheduleStatus, Vec<ClassifiedStatus>> = IndexMap::new();
        for status in statuses {
            groups.entry(status.status).or_default().push(status.clone());
        }

        let mut records = Vec::with_capacity(groups.len());
        for (status, courses) in groups {
            records.extend(self.user_notification(user, &courses, status, timestamp)?);
        }
        Ok(records)
    }
}

/// Counts over a set of notification records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    pub total_sent: usize,
    pub user_reminders: usize,
    pub manager_summaries: usize,
}

impl NotificationStats {
    pub fn from_records(records: &[NotificationRecord]) -> Self {
        records.iter().fold(Self::default(), |mut stats, record| {
            stats.total_sent += 1;
            match record.kind {
                NotificationKind::UserReminder { .. } => stats.user_reminders += 1,
                NotificationKind::ManagerSummary { .. } => stats.manager_summaries += 1,
            }
            stats
        })
    }
}
