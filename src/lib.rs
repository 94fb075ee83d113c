//! LearnTrack -- training deadline tracking and reminder notifications.
//!
//! This crate provides the deadline status engine, per-user aggregation,
//! notification templates, the daily reminder job, and the HTTP API that
//! exposes them.

pub mod api;
pub mod config;
pub mod jobs;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod status;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::storage::RecordStore;

/// Start the LearnTrack service: API server plus the daily job scheduler.
pub async fn serve(config: Config) -> Result<()> {
    // 1. Load records
    let store = config.record_store();
    let data = store.load().context("failed to load records")?;
    tracing::info!(
        users = data.users.len(),
        courses = data.schedules.len(),
        "Records loaded"
    );

    // 2. Build state
    let job = config.reminder_job(None);
    let state = api::state::AppState::new(config.clone(), data, job);

    // 3. Start scheduler (background task)
    if config.scheduler.enabled {
        let schedule = scheduler::JobSchedule::parse(&config.scheduler.cron)?;
        let job = Arc::clone(&state.job);
        tokio::spawn(async move {
            scheduler::run_scheduler_loop(schedule, job).await;
        });
    } else {
        tracing::info!("Scheduler disabled; reminder job runs only on demand");
    }

    // 4. Start API server
    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;
    let app = api::router(state);

    tracing::info!(%addr, "LearnTrack listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
