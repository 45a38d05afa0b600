/// Health check endpoints
///
/// `/health` answers as long as the process serves requests. `/health/ready`
/// also checks the database and reports whether outgoing mail is configured.
use crate::{context::AppContext, error::AppResult};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy", "degraded", or "unhealthy"
    pub status: String,
    pub version: String,
    pub checks: Vec<ComponentHealth>,
}

/// Health status of individual component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/ready", get(readiness_probe))
}

/// Liveness: returns simple JSON with status and version
pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness with per-component detail; 503 when the database is down
pub async fn readiness_probe(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let checks = vec![check_database_detailed(&ctx).await, check_mailer(&ctx)];
    let status = determine_overall_status(&checks);

    let code = match status.as_str() {
        "unhealthy" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    if code != StatusCode::OK {
        tracing::warn!(status = %status, "readiness_probe_failed");
    }

    (
        code,
        Json(HealthStatus {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks,
        }),
    )
}

async fn check_database(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

async fn check_database_detailed(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();
    let result = check_database(ctx).await;
    let response_time_ms = Some(start.elapsed().as_millis() as u64);

    match result {
        Ok(()) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            response_time_ms,
            error: None,
        },
        Err(e) => ComponentHealth {
            name: "database".to_string(),
            status: "unhealthy".to_string(),
            response_time_ms,
            error: Some(e.to_string()),
        },
    }
}

/// Missing SMTP settings only disable password reset mail
fn check_mailer(ctx: &AppContext) -> ComponentHealth {
    let configured = ctx.email_enabled();
    ComponentHealth {
        name: "mailer".to_string(),
        status: if configured { "healthy" } else { "degraded" }.to_string(),
        response_time_ms: None,
        error: (!configured).then(|| "SMTP not configured".to_string()),
    }
}

fn determine_overall_status(checks: &[ComponentHealth]) -> String {
    if checks.iter().any(|c| c.status == "unhealthy") {
        "unhealthy".to_string()
    } else if checks.iter().any(|c| c.status == "degraded") {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}
