//! API route definitions.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::error::ApiError;
use super::state::AppState;
use crate::jobs::JobError;
use crate::models::timestamp;
use crate::notify::LogPage;
use crate::status::summarize_statuses;
use crate::storage::RecordStore;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/users", get(list_users))
        .route("/users/{user_id}", get(get_user))
        .route("/users/{user_id}/enrollments", get(user_enrollments))
        .route("/users/{user_id}/status", get(user_status))
        .route("/users/{user_id}/summary", get(user_summary))
        .route("/courses", get(list_courses))
        .route("/dashboard", get(dashboard))
        .route("/email-logs", get(email_logs))
        .route("/stats", get(stats))
        .route("/run-job", post(run_job))
}

/// Optional `?as_of=` override for reproducible reads.
#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    pub as_of: Option<String>,
}

impl AsOfQuery {
    fn resolve(&self) -> Result<NaiveDateTime, ApiError> {
        self.explicit()
            .map(|as_of| as_of.unwrap_or_else(|| Local::now().naive_local()))
    }

    fn explicit(&self) -> Result<Option<NaiveDateTime>, ApiError> {
        match self.as_of.as_deref() {
            None => Ok(None),
            Some(raw) => timestamp::parse(raw)
                .map(Some)
                .ok_or_else(|| ApiError::bad_request(format!("invalid as_of timestamp '{raw}'"))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    10
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn list_users(State(state): State<AppState>) -> Json<Value> {
    let data = state.snapshot().await;
    Json(json!({ "data": data.users, "meta": { "total": data.users.len() } }))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let data = state.snapshot().await;
    let user = data
        .user(&user_id)
        .ok_or_else(|| ApiError::not_found(format!("user '{user_id}' not found")))?;
    Ok(Json(json!({ "data": user })))
}

async fn user_enrollments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<Value>, ApiError> {
    let as_of = query.resolve()?;
    let data = state.snapshot().await;
    let enrollments: Vec<Value> = data
        .enrollments_for(&user_id)
        .iter()
        .map(|e| {
            json!({
                "course_id": e.course_id,
                "status": e.status,
                "enrollment_date": e.enrollment_date,
                "start_date": e.start_date,
                "completion_date": e.completion_date,
                "days_since_enrollment": e.days_since_enrollment(as_of),
            })
        })
        .collect();
    Ok(Json(json!({ "data": enrollments, "meta": { "total": enrollments.len() } })))
}

async fn user_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<Value>, ApiError> {
    let as_of = query.resolve()?;
    let data = state.snapshot().await;
    let enrollments = data.enrollments_for(&user_id);
    if enrollments.is_empty() {
        return Err(ApiError::not_found(format!("no enrollments found for user '{user_id}'")));
    }

    let statuses = data.status_service().classify_user(enrollments, as_of)?;
    Ok(Json(json!({
        "data": statuses,
        "meta": { "total": statuses.len(), "as_of": as_of }
    })))
}

async fn user_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<Value>, ApiError> {
    let as_of = query.resolve()?;
    let data = state.snapshot().await;
    let enrollments = data.enrollments_for(&user_id);
    if enrollments.is_empty() {
        return Err(ApiError::not_found(format!("no enrollments found for user '{user_id}'")));
    }

    let summary = data.status_service().summarize_user(enrollments, as_of)?;
    Ok(Json(json!({ "data": summary, "meta": { "as_of": as_of } })))
}

async fn list_courses(State(state): State<AppState>) -> Json<Value> {
    let data = state.snapshot().await;
    Json(json!({ "data": data.schedules, "meta": { "total": data.schedules.len() } }))
}

async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<Value>, ApiError> {
    let as_of = query.resolve()?;
    let data = state.snapshot().await;
    let service = data.status_service();

    let mut rows = Vec::new();
    let mut failed = Vec::new();
    for user in &data.users {
        let enrollments = data.enrollments_for(&user.user_id);
        if enrollments.is_empty() {
            continue;
        }
        let statuses = match service.classify_user(enrollments, as_of) {
            Ok(statuses) => statuses,
            Err(e) => {
                failed.push(json!({ "user_id": user.user_id, "message": e.to_string() }));
                continue;
            }
        };
        let summary = summarize_statuses(&statuses);
        rows.push(json!({
            "user_id": user.user_id,
            "name": user.name,
            "email": user.email,
            "hire_date": user.hire_date,
            "summary": summary,
            "needs_attention_count": statuses.iter().filter(|s| s.needs_reminder()).count(),
            "progress_percentage": percentage(summary.completed, summary.total_courses),
        }));
    }

    Ok(Json(json!({
        "data": rows,
        "meta": { "total": rows.len(), "failed": failed, "as_of": as_of }
    })))
}

async fn email_logs(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let sink = state.config.log_sink();
    let page: LogPage = tokio::task::spawn_blocking(move || sink.page(query.page, query.per_page))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(json!({ "data": page })))
}

async fn stats(
    State(state): State<AppState>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<Value>, ApiError> {
    let as_of = query.resolve()?;
    let data = state.snapshot().await;
    let service = data.status_service();

    let (mut completed, mut needs_reminder, mut in_progress, mut users_failed) = (0, 0, 0, 0);
    for user in &data.users {
        let enrollments = data.enrollments_for(&user.user_id);
        if enrollments.is_empty() {
            continue;
        }
        let Ok(summary) = service.summarize_user(enrollments, as_of) else {
            users_failed += 1;
            continue;
        };
        completed += summary.completed;
        needs_reminder += summary.needs_reminder;
        in_progress += summary.in_progress;
    }
    let total_enrollments = data.total_enrollments();

    Ok(Json(json!({
        "data": {
            "total_users": data.users.len(),
            "total_enrollments": total_enrollments,
            "total_courses": data.schedules.len(),
            "completed_courses": completed,
            "courses_needing_attention": needs_reminder,
            "courses_in_progress": in_progress,
            "users_failed": users_failed,
            "completion_rate": percentage(completed, total_enrollments),
        },
        "meta": { "as_of": as_of }
    })))
}

async fn run_job(
    State(state): State<AppState>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<Value>, ApiError> {
    let as_of = query.explicit()?;
    info!(?as_of, "Manual reminder job triggered");

    let job = state.job.clone();
    let result = tokio::task::spawn_blocking(move || job.run(as_of))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            error!("Manual reminder job failed: {}", e);
            let message = match &e {
                JobError::Sink { attempted, .. } => {
                    format!("{e} ({attempted} notification(s) composed)")
                }
                JobError::Load(_) => e.to_string(),
            };
            return Err(ApiError::job_failed(message));
        }
    };

    // pick up any record changes the job saw
    let store = state.config.record_store();
    match tokio::task::spawn_blocking(move || store.load()).await {
        Ok(Ok(data)) => state.replace(data).await,
        Ok(Err(e)) => error!("Failed to refresh records after job: {}", e),
        Err(e) => error!("Record refresh task failed: {}", e),
    }

    Ok(Json(json!({ "data": { "success": true, "stats": stats } })))
}
