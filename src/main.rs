use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use learntrack::config::{Config, LoggingConfig};
use learntrack::notify::{MemorySink, NotificationSink, NotificationStats, Template};
use learntrack::status::summarize_statuses;
use learntrack::storage::RecordStore;

#[derive(Parser)]
#[command(
    name = "learntrack",
    about = "Training deadline tracking and reminder notifications",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (falls back to LEARNTRACK_CONFIG, then ./learntrack.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the service (API server + daily reminder scheduler)
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run the reminder job once
    RunJob {
        /// Evaluate deadlines as of this timestamp instead of now
        #[arg(long, value_parser = parse_as_of)]
        as_of: Option<NaiveDateTime>,

        /// Compose notifications without appending them to the log
        #[arg(long)]
        dry_run: bool,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show classified course status for one user
    Status {
        user_id: String,

        #[arg(long, value_parser = parse_as_of)]
        as_of: Option<NaiveDateTime>,
    },

    /// Show every notification a user would receive, one per status group
    Preview {
        user_id: String,

        #[arg(long, value_parser = parse_as_of)]
        as_of: Option<NaiveDateTime>,

        /// Render all courses with one template tag instead (unknown tags use "needs reminder")
        #[arg(long)]
        template: Option<String>,
    },

    /// Page through the notification log
    Logs {
        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "10")]
        per_page: usize,
    },

    /// Inspect the job schedule
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Preview when the reminder job will run in the next N hours
    DryRun {
        /// Hours to preview
        #[arg(long, default_value = "48")]
        hours: u64,
    },
}

fn parse_as_of(raw: &str) -> Result<NaiveDateTime, String> {
    learntrack::models::timestamp::parse(raw)
        .ok_or_else(|| format!("expected YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS], got '{raw}'"))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting LearnTrack service");
            learntrack::serve(config).await?;
        }
        Commands::RunJob {
            as_of,
            dry_run,
            json,
        } => {
            let memory = Arc::new(MemorySink::new());
            let sink: Option<Arc<dyn NotificationSink>> = if dry_run {
                Some(memory.clone())
            } else {
                None
            };
            let job = config.reminder_job(sink);
            let stats = tokio::task::spawn_blocking(move || job.run(as_of)).await??;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("\n=== Reminder Job Summary ({}) ===", stats.execution_date);
                println!("Users Processed:          {}", stats.users_processed);
                println!("Users Skipped:            {}", stats.users_skipped);
                println!("Users Failed:             {}", stats.users_failed);
                println!("Users Needing Reminders:  {}", stats.users_needing_reminders);
                println!("Reminder Emails Sent:     {}", stats.reminder_emails_sent);
                println!("Manager Summaries Sent:   {}", stats.manager_summaries_sent);
                println!("Total Emails Sent:        {}", stats.total_emails_sent);
                for failure in &stats.failures {
                    println!(" ! {}: {}", failure.user_id, failure.message);
                }
                if dry_run {
                    let composed = NotificationStats::from_records(&memory.records());
                    println!(
                        "\n(dry run: {} notification(s) not logged, {} reminder(s), {} team report(s))",
                        composed.total_sent, composed.user_reminders, composed.manager_summaries
                    );
                }
                println!();
            }
        }
        Commands::Status { user_id, as_of } => {
            let as_of = as_of.unwrap_or_else(|| Local::now().naive_local());
            let data = config.record_store().load()?;
            let enrollments = data.enrollments_for(&user_id);
            if enrollments.is_empty() {
                anyhow::bail!("No enrollments found for user '{}'", user_id);
            }

            let statuses = data
                .status_service()
                .classify_user(enrollments, as_of)
                .with_context(|| format!("cannot classify user '{}'", user_id))?;
            println!("{:<15} | {:<15} | {:<7} | Details", "Course", "Status", "Overdue");
            println!("{:-<15}-|-{:-<15}-|-{:-<7}-|-{:-<40}", "", "", "", "");
            for s in &statuses {
                println!(
                    "{:<15} | {:<15} | {:<7} | {}",
                    s.course_id, s.status, s.days_overdue, s.message
                );
            }

            let summary = summarize_statuses(&statuses);
            println!(
                "\n{} course(s): {} completed, {} in progress ({} on track), {} need attention",
                summary.total_courses,
                summary.completed,
                summary.in_progress,
                summary.on_track,
                summary.needs_reminder
            );
        }
        Commands::Preview {
            user_id,
            as_of,
            template,
        } => {
            let as_of = as_of.unwrap_or_else(|| Local::now().naive_local());
            let data = config.record_store().load()?;
            let user = data
                .user(&user_id)
                .with_context(|| format!("user '{}' not found", user_id))?;
            let statuses = data
                .status_service()
                .classify_user(data.enrollments_for(&user_id), as_of)
                .with_context(|| format!("cannot classify user '{}'", user_id))?;

            if let Some(tag) = template {
                let template = Template::for_tag(&tag);
                println!("To:      {}", user.email);
                println!("Subject: {}", template.subject(user));
                println!("{}", template.body(user, &statuses)?);
                return Ok(());
            }

            let digest = config
                .composer()
                .digest(user, &statuses, Local::now().naive_local())?;
            if digest.is_empty() {
                println!("Nothing to send to {}.", user.email);
            }
            for record in digest {
                println!("To:      {}", record.to);
                println!("Subject: {}", record.subject);
                println!("{}", record.body);
                println!("{:-<80}", "");
            }
        }
        Commands::Logs { page, per_page } => {
            let page = config.log_sink().page(page, per_page)?;
            println!(
                "Page {}/{} ({} entries total)",
                page.page, page.total_pages, page.total
            );
            for entry in &page.logs {
                println!(
                    "{} | {:<35} | {}",
                    entry["timestamp"].as_str().unwrap_or("-"),
                    entry["to"].as_str().unwrap_or("-"),
                    entry["subject"].as_str().unwrap_or("-")
                );
            }
        }
        Commands::Schedule { action } => match action {
            ScheduleAction::DryRun { hours } => {
                let schedule = learntrack::scheduler::JobSchedule::parse(&config.scheduler.cron)?;
                let preview = schedule.preview_next_runs(hours);
                if !config.scheduler.enabled {
                    println!("(scheduler is disabled in config)");
                }
                if preview.is_empty() {
                    println!("No runs scheduled in next {} hours.", hours);
                } else {
                    println!("Upcoming runs (next {} hours, cron '{}'):", hours, schedule.expr());
                    for time in preview {
                        println!("{}", time.to_rfc3339());
                    }
                }
            }
        },
    }

    Ok(())
}
