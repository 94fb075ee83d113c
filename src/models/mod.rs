//! Record types: users, enrollments, course schedules and derived statuses.

pub mod timestamp;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Lifecycle tag of an enrollment as recorded by the learning platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    Enrolled,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrollmentStatus::Enrolled => write!(f, "Enrolled"),
            EnrollmentStatus::InProgress => write!(f, "In Progress"),
            EnrollmentStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// Classified position of an enrollment relative to its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleStatus {
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "needs reminder")]
    NeedsReminder,
    #[serde(rename = "progressed")]
    Progressed,
    #[serde(rename = "completed")]
    Completed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Started => "started",
            ScheduleStatus::NeedsReminder => "needs reminder",
            ScheduleStatus::Progressed => "progressed",
            ScheduleStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// An employee, with the manager who receives the team summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub manager_email: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub hire_date: NaiveDateTime,
}

/// A user's relationship to one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub course_id: String,
    pub status: EnrollmentStatus,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub enrollment_date: NaiveDateTime,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub start_date: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub completion_date: Option<NaiveDateTime>,
}

impl EnrollmentRecord {
    pub fn is_completed(&self) -> bool {
        self.status == EnrollmentStatus::Completed
    }

    pub fn is_started(&self) -> bool {
        self.start_date.is_some()
    }

    /// Whole days between enrollment and `as_of`, floored.
    pub fn days_since_enrollment(&self, as_of: NaiveDateTime) -> i64 {
        whole_days(as_of - self.enrollment_date)
    }

    /// Check the record against the lifecycle invariants.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.course_id.trim().is_empty() {
            return Err("course id is empty");
        }
        match (self.status, self.completion_date) {
            (EnrollmentStatus::Completed, None) => Err("marked Completed without a completion date"),
            (EnrollmentStatus::Enrolled | EnrollmentStatus::InProgress, Some(_)) => {
                Err("completion date set but status is not Completed")
            }
            _ => Ok(()),
        }
    }
}

/// Floor a duration to whole days; negative partial days round down.
pub fn whole_days(delta: chrono::Duration) -> i64 {
    delta.num_seconds().div_euclid(86_400)
}

/// Deadline policy for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub course_id: String,
    pub days_to_complete: u32,
    /// Grouping only, never part of deadline math.
    pub batch: i64,
}

/// Result of classifying one enrollment against its schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedStatus {
    pub course_id: String,
    pub status: ScheduleStatus,
    pub enrollment: Option<EnrollmentRecord>,
    pub schedule: ScheduleRecord,
    pub days_overdue: i64,
    pub message: String,
}

impl ClassifiedStatus {
    pub fn needs_reminder(&self) -> bool {
        self.status == ScheduleStatus::NeedsReminder
    }
}

/// Per-user counts across all schedule-matched enrollments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub total_courses: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub needs_reminder: usize,
    pub on_track: usize,
}

/// One row of a manager's team report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub user_name: String,
    pub user_email: String,
    pub completed_count: usize,
    pub in_progress_count: usize,
    pub needs_reminder_count: usize,
    pub total_courses: usize,
}

impl MemberSummary {
    pub fn new(user: &User, summary: &UserSummary) -> Self {
        Self {
            user_name: user.name.clone(),
            user_email: user.email.clone(),
            completed_count: summary.completed,
            in_progress_count: summary.in_progress,
            needs_reminder_count: summary.needs_reminder,
            total_courses: summary.total_courses,
        }
    }
}
