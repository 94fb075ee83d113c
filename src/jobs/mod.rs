//! Batch jobs.

pub mod reminder;

pub use self::reminder::{JobError, JobStats, ReminderJob, RunOutcome, UserFailure};
