use anyhow::Result;
use chrono::{DateTime, Duration, Local, TimeZone};
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// When the reminder job fires, as a parsed cron expression.
#[derive(Debug, Clone)]
pub struct JobSchedule {
    expr: String,
    schedule: CronSchedule,
}

impl JobSchedule {
    pub fn parse(expr: &str) -> Result<Self> {
        let schedule = CronSchedule::from_str(expr)
            .map_err(|e| anyhow::anyhow!("Invalid cron expression '{}': {}", expr, e))?;
        Ok(Self {
            expr: expr.to_string(),
            schedule,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// First firing strictly after `after`.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }

    /// Firings in the window `(from, from + hours]`.
    /// This is strictly a dry-run preview, not the execution loop.
    pub fn runs_within<Tz: TimeZone>(&self, from: &DateTime<Tz>, hours: u64) -> Vec<DateTime<Tz>> {
        let end = from.clone() + Duration::hours(hours as i64);
        self.schedule
            .after(from)
            .take_while(|next| *next <= end)
            .collect()
    }

    pub fn preview_next_runs(&self, hours: u64) -> Vec<DateTime<Local>> {
        self.runs_within(&Local::now(), hours)
    }
}
