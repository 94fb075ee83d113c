//! API layer -- axum routes, handlers, and middleware.

pub mod error;
mod routes;
pub mod state;

use self::state::AppState;
use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    Router::new()
        .nest("/api", routes::api_routes())
        .fallback(fallback)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any origin unless a list is configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}

async fn fallback() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "not found")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::RecordStore;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    fn fixture(dir: &std::path::Path) -> AppState {
        std::fs::write(
            dir.join("users.json"),
            r#"[
              {"user_id": "u1", "name": "Avery Lee", "email": "avery@example.com",
               "manager_email": "morgan@example.com", "hire_date": "2024-12-30"},
              {"user_id": "u2", "name": "Noor Haddad", "email": "noor@example.com",
               "manager_email": "morgan@example.com", "hire_date": "2024-12-30"},
              {"user_id": "u3", "name": "Kiara Patel", "email": "kiara@example.com",
               "manager_email": "morgan@example.com", "hire_date": "2024-12-30"}
            ]"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("course_schedules.json"),
            r#"[{"course_id": "C1", "days_to_complete": 3, "batch": 0},
                {"course_id": "C2", "days_to_complete": 3, "batch": 0}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("course_enrollments.json"),
            r#"[{"user_id": "u1", "enrollments": [
                {"course_id": "C1", "status": "In Progress", "enrollment_date": "2025-01-01",
                 "start_date": "2025-01-01", "completion_date": null},
                {"course_id": "C2", "status": "Completed", "enrollment_date": "2025-01-01",
                 "start_date": "2025-01-01", "completion_date": "2025-01-02"},
                {"course_id": "ELECTIVE", "status": "In Progress", "enrollment_date": "2025-01-01",
                 "start_date": "2025-01-01", "completion_date": "2025-01-02"}
            ]},
            {"user_id": "u3", "enrollments": [
                {"course_id": "C1", "status": "Completed", "enrollment_date": "2025-01-01",
                 "start_date": "2025-01-01", "completion_date": null}
            ]}]"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.data.dir = dir.to_path_buf();
        let data = config.record_store().load().unwrap();
        let job = config.reminder_job(None);
        AppState::new(config, data, job)
    }

    async fn call(state: AppState, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (status, json) = call(fixture(dir.path()), Method::GET, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "ok");
        assert!(json["meta"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_status_as_of() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture(dir.path());

        let (status, json) =
            call(state.clone(), Method::GET, "/api/users/u1/status?as_of=2025-01-04").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["meta"]["total"], 2);
        assert_eq!(json["data"][0]["status"], "progressed");
        assert_eq!(json["data"][0]["message"], "In progress - 0 days remaining");
        assert_eq!(json["data"][1]["status"], "completed");

        let (_, json) = call(state, Method::GET, "/api/users/u1/status?as_of=2025-01-05").await;
        assert_eq!(json["data"][0]["status"], "needs reminder");
        assert_eq!(json["data"][0]["days_overdue"], 1);
    }

    #[tokio::test]
    async fn test_user_without_enrollments_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (status, json) = call(fixture(dir.path()), Method::GET, "/api/users/u2/summary").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["kind"], "not_found");
        assert!(json["error"]["message"].as_str().unwrap().contains("u2"));
    }

    #[tokio::test]
    async fn test_broken_record_reads_match_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture(dir.path());

        for uri in ["/api/users/u3/status", "/api/users/u3/summary"] {
            let (status, json) = call(state.clone(), Method::GET, uri).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(json["error"]["kind"], "invalid_record");
            assert!(json["error"]["message"].as_str().unwrap().contains("'C1'"));
        }

        let (_, json) = call(state, Method::GET, "/api/stats?as_of=2025-01-04").await;
        assert_eq!(json["data"]["users_failed"], 1);
        assert_eq!(json["data"]["completed_courses"], 1);
    }

    #[tokio::test]
    async fn test_bad_as_of_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (status, json) =
            call(fixture(dir.path()), Method::GET, "/api/dashboard?as_of=soon").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["kind"], "bad_request");
    }

    #[tokio::test]
    async fn test_dashboard_skips_users_without_enrollments() {
        let dir = tempfile::tempdir().unwrap();
        let (_, json) =
            call(fixture(dir.path()), Method::GET, "/api/dashboard?as_of=2025-01-04").await;
        assert_eq!(json["meta"]["total"], 1);
        assert_eq!(json["meta"]["failed"][0]["user_id"], "u3");
        assert_eq!(json["data"][0]["user_id"], "u1");
        assert_eq!(json["data"][0]["progress_percentage"], 50.0);
        assert_eq!(json["data"][0]["needs_attention_count"], 0);
    }

    #[tokio::test]
    async fn test_run_job_then_read_logs() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture(dir.path());

        let (status, json) =
            call(state.clone(), Method::POST, "/api/run-job?as_of=2025-01-10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["success"], true);
        assert_eq!(json["data"]["stats"]["reminder_emails_sent"], 1);
        assert_eq!(json["data"]["stats"]["manager_summaries_sent"], 1);
        assert_eq!(json["data"]["stats"]["users_failed"], 1);

        let (_, json) = call(state, Method::GET, "/api/email-logs?per_page=1").await;
        assert_eq!(json["data"]["total"], 2);
        assert_eq!(json["data"]["total_pages"], 2);
        assert_eq!(json["data"]["logs"][0]["to"], "avery@example.com");
    }

    #[tokio::test]
    async fn test_unknown_route_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = call(fixture(dir.path()), Method::GET, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
