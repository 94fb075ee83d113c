use crate::jobs::ReminderJob;
use crate::scheduler::JobSchedule;
use chrono::Local;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Main scheduler execution loop.
/// Sleeps until the next cron firing, runs the reminder job off the async
/// runtime, and repeats. A failed run is logged and the loop carries on.
pub async fn run_scheduler_loop(schedule: JobSchedule, job: Arc<ReminderJob>) {
    info!(cron = %schedule.expr(), "Scheduler engine started");

    loop {
        let now = Local::now();
        let Some(next) = schedule.next_after(&now) else {
            warn!(cron = %schedule.expr(), "Schedule has no future runs, stopping");
            return;
        };

        let wait = (next - now).to_std().unwrap_or_default();
        info!(next_run = %next.to_rfc3339(), "Next reminder job scheduled");
        tokio::time::sleep(wait).await;

        let job = job.clone();
        match tokio::task::spawn_blocking(move || job.run(None)).await {
            Ok(Ok(stats)) => {
                info!(total_emails_sent = stats.total_emails_sent, "Scheduled reminder job finished");
            }
            Ok(Err(e)) => {
                error!("Scheduled reminder job failed: {}", e);
            }
            Err(e) => {
                error!("Scheduled reminder job panicked: {}", e);
            }
        }
    }
}
