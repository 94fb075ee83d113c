//! Subject/body templates, one per classified status plus the manager report.
//!
//! Bodies are askama templates under `templates/notify/`.

use askama::Template as Render;

use crate::models::{ClassifiedStatus, MemberSummary, ScheduleStatus, User};

#[derive(Render)]
#[template(path = "notify/needs_reminder.txt")]
struct NeedsReminderBody<'a> {
    name: &'a str,
    courses: &'a [ClassifiedStatus],
}

#[derive(Render)]
#[template(path = "notify/progressed.txt")]
struct ProgressedBody<'a> {
    name: &'a str,
    courses: &'a [ClassifiedStatus],
}

#[derive(Render)]
#[template(path = "notify/started.txt")]
struct StartedBody<'a> {
    name: &'a str,
    courses: &'a [ClassifiedStatus],
}

#[derive(Render)]
#[template(path = "notify/completed.txt")]
struct CompletedBody<'a> {
    name: &'a str,
    courses: &'a [ClassifiedStatus],
}

#[derive(Render)]
#[template(path = "notify/manager_summary.txt")]
struct ManagerSummaryBody<'a> {
    members: &'a [MemberSummary],
}

/// Per-status template for a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    NeedsReminder,
    Progressed,
    Started,
    Completed,
}

impl Template {
    pub fn for_status(status: ScheduleStatus) -> Self {
        match status {
            ScheduleStatus::NeedsReminder => Template::NeedsReminder,
            ScheduleStatus::Progressed => Template::Progressed,
            ScheduleStatus::Started => Template::Started,
            ScheduleStatus::Completed => Template::Completed,
        }
    }

    /// Resolve a wire tag (`"needs reminder"`, `"progressed"`, ...).
    /// Unrecognised tags resolve to [`Template::NeedsReminder`].
    pub fn for_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().replace('_', " ").as_str() {
            "progressed" => Template::Progressed,
            "started" => Template::Started,
            "completed" => Template::Completed,
            _ => Template::NeedsReminder,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Template::NeedsReminder => "needs_reminder",
            Template::Progressed => "progressed",
            Template::Started => "started",
            Template::Completed => "completed",
        }
    }

    pub fn subject(&self, user: &User) -> String {
        let name = &user.name;
        match self {
            Template::NeedsReminder => {
                format!("[Action Required] Course Completion Reminder for {name}")
            }
            Template::Progressed => format!("Great Progress on Your Learning Journey, {name}!"),
            Template::Started => format!("Welcome to Your Learning Journey, {name}!"),
            Template::Completed => {
                format!("Congratulations on Completing Your Courses, {name}!")
            }
        }
    }

    pub fn body(&self, user: &User, courses: &[ClassifiedStatus]) -> askama::Result<String> {
        let name = user.name.as_str();
        match self {
            Template::NeedsReminder => NeedsReminderBody { name, courses }.render(),
            Template::Progressed => ProgressedBody { name, courses }.render(),
            Template::Started => StartedBody { name, courses }.render(),
            Template::Completed => CompletedBody { name, courses }.render(),
        }
    }
}

/// Team progress report sent to a manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagerSummaryTemplate;

impl ManagerSummaryTemplate {
    pub fn subject(&self, member_count: usize) -> String {
        format!("Daily Learning Progress Report - {member_count} Team Members")
    }

    pub fn body(&self, members: &[MemberSummary]) -> askama::Result<String> {
        ManagerSummaryBody { members }.render()
    }
}
