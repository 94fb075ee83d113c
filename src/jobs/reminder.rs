//! Daily reminder job.
//!
//! Load everything, classify each user's enrollments, remind users with
//! overdue courses, send each manager one team report, then append every
//! composed notification to the log in a single write.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, info_span, warn};

use crate::models::{ClassifiedStatus, EnrollmentRecord, MemberSummary, ScheduleStatus, User};
use crate::notify::{Composer, NotificationRecord, NotificationSink, SinkError};
use crate::status::{summarize_statuses, StatusService, UserError};
use crate::storage::{Dataset, RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to load records: {0}")]
    Load(#[from] StoreError),
    #[error("composed {attempted} notification(s) but the log append failed: {source}")]
    Sink {
        attempted: usize,
        #[source]
        source: SinkError,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserFailure {
    pub user_id: String,
    pub message: String,
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct JobStats {
    pub execution_date: String,
    pub users_processed: usize,
    pub users_skipped: usize,
    pub users_failed: usize,
    pub users_needing_reminders: usize,
    pub reminder_emails_sent: usize,
    pub manager_summaries_sent: usize,
    pub total_emails_sent: usize,
    pub failures: Vec<UserFailure>,
}

/// Everything a run produced, before anything touches the sink.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub stats: JobStats,
    pub notifications: Vec<NotificationRecord>,
}

/// Per-user result of the compute phase.
struct UserOutcome {
    reminders: Vec<ClassifiedStatus>,
    member: MemberSummary,
}

pub struct ReminderJob {
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn NotificationSink>,
    composer: Composer,
}

impl ReminderJob {
    pub fn new(
        store: Arc<dyn RecordStore>,
        sink: Arc<dyn NotificationSink>,
        composer: Composer,
    ) -> Self {
        Self {
            store,
            sink,
            composer,
        }
    }

    /// Load, compose and log. `as_of` defaults to the local wall clock.
    pub fn run(&self, as_of: Option<NaiveDateTime>) -> Result<JobStats, JobError> {
        let as_of = as_of.unwrap_or_else(|| Local::now().naive_local());
        let span = info_span!("reminder_job", %as_of);
        let _enter = span.enter();

        info!("Running daily reminder job");
        let data = self.store.load()?;
        let outcome = self.process(&data, as_of);

        let attempted = outcome.notifications.len();
        if let Err(source) = self.sink.append(&outcome.notifications) {
            error!(attempted, "Failed to save notification log: {}", source);
            return Err(JobError::Sink { attempted, source });
        }

        let stats = outcome.stats;
        info!(
            users_processed = stats.users_processed,
            users_skipped = stats.users_skipped,
            users_failed = stats.users_failed,
            users_needing_reminders = stats.users_needing_reminders,
            reminder_emails_sent = stats.reminder_emails_sent,
            manager_summaries_sent = stats.manager_summaries_sent,
            total_emails_sent = stats.total_emails_sent,
            "Reminder job complete"
        );
        Ok(stats)
    }

    /// Compute phase: no I/O, every notification returned in memory.
    pub fn process(&self, data: &Dataset, as_of: NaiveDateTime) -> RunOutcome {
        let service = data.status_service();
        let timestamp = Local::now().naive_local();

        let mut stats = JobStats {
            execution_date: as_of.format("%Y-%m-%dT%H:%M:%S").to_string(),
            ..JobStats::default()
        };
        let mut reminders: Vec<(&User, Vec<ClassifiedStatus>)> = Vec::new();
        let mut teams: IndexMap<&str, Vec<MemberSummary>> = IndexMap::new();

        for user in &data.users {
            let enrollments = data.enrollments_for(&user.user_id);
            if enrollments.is_empty() {
                info!(user_id = %user.user_id, "{}: No enrollments found", user.name);
                stats.users_skipped += 1;
                continue;
            }

            match process_user(&service, user, enrollments, as_of) {
                Ok(outcome) => {
                    stats.users_processed += 1;
                    if outcome.reminders.is_empty() {
                        info!(user_id = %user.user_id, "{}: All courses on track", user.name);
                    } else {
                        info!(
                            user_id = %user.user_id,
                            "{}: {} course(s) need attention",
                            user.name,
                            outcome.reminders.len()
                        );
                        reminders.push((user, outcome.reminders));
                    }
                    teams
                        .entry(user.manager_email.as_str())
                        .or_default()
                        .push(outcome.member);
                }
                Err(e) => {
                    warn!(user_id = %user.user_id, "Skipping user: {}", e);
                    stats.users_failed += 1;
                    stats.failures.push(UserFailure {
                        user_id: user.user_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        stats.users_needing_reminders = reminders.len();

        let mut notifications = Vec::new();
        for (user, courses) in &reminders {
            match self.composer.user_notification(
                user,
                courses,
                ScheduleStatus::NeedsReminder,
                timestamp,
            ) {
                Ok(Some(record)) => {
                    notifications.push(record);
                    stats.reminder_emails_sent += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(user_id = %user.user_id, "Failed to compose reminder: {}", e);
                    stats.failures.push(UserFailure {
                        user_id: user.user_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        for (manager_email, members) in &teams {
            match self
                .composer
                .manager_notification(manager_email, members, timestamp)
            {
                Ok(Some(record)) => {
                    notifications.push(record);
                    stats.manager_summaries_sent += 1;
                }
                Ok(None) => {}
                Err(e) => error!(%manager_email, "Failed to compose team report: {}", e),
            }
        }

        stats.total_emails_sent = stats.reminder_emails_sent + stats.manager_summaries_sent;
        RunOutcome {
            stats,
            notifications,
        }
    }
}

fn process_user(
    service: &StatusService,
    user: &User,
    enrollments: &[EnrollmentRecord],
    as_of: NaiveDateTime,
) -> Result<UserOutcome, UserError> {
    let statuses = service.classify_user(enrollments, as_of)?;
    let summary = summarize_statuses(&statuses);
    let reminders = statuses
        .into_iter()
        .filter(ClassifiedStatus::needs_reminder)
        .collect();

    Ok(UserOutcome {
        reminders,
        member: MemberSummary::new(user, &summary),
    })
}
