/// Health check endpoints for liveness and readiness probes
///
/// Readiness covers database connectivity and a writable media directory.
use crate::{context::AppContext, error::PlazaResult, metrics};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall status: "healthy", "degraded", or "unhealthy"
    pub status: String,
    pub version: String,
    pub checks: Vec<ComponentHealth>,
}

/// Health status of individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build health and metrics routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/ready", get(readiness_probe))
        .route("/metrics", get(metrics_endpoint))
}

/// Liveness: responds while the process is serving
pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness: 200 when every component is healthy, 503 otherwise
pub async fn readiness_probe(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let checks = vec![
        timed("database", check_database(&ctx)).await,
        timed("media_storage", check_media_storage(&ctx)).await,
    ];

    let status = determine_overall_status(&checks);
    let code = if status == "unhealthy" {
        tracing::warn!(?checks, "Readiness probe failed");
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(HealthStatus {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks,
        }),
    )
}

/// Prometheus text exposition
pub async fn metrics_endpoint() -> String {
    metrics::render_metrics()
}

async fn timed(name: &str, check: impl std::future::Future<Output = PlazaResult<()>>) -> ComponentHealth {
    let start = Instant::now();
    let result = check.await;
    let response_time_ms = Some(start.elapsed().as_millis() as u64);

    match result {
        Ok(()) => ComponentHealth {
            name: name.to_string(),
            status: "healthy".to_string(),
            response_time_ms,
            error: None,
        },
        Err(e) => ComponentHealth {
            name: name.to_string(),
            status: "unhealthy".to_string(),
            response_time_ms,
            error: Some(e.to_string()),
        },
    }
}

async fn check_database(ctx: &AppContext) -> PlazaResult<()> {
    sqlx::query("SELECT 1").execute(&ctx.db).await?;
    Ok(())
}

async fn check_media_storage(ctx: &AppContext) -> PlazaResult<()> {
    let metadata = tokio::fs::metadata(&ctx.config.media.directory).await?;
    if metadata.permissions().readonly() {
        return Err(crate::error::PlazaError::MediaStorage(
            "Media directory is read-only".to_string(),
        ));
    }
    Ok(())
}

/// Determine overall health status from individual checks
fn determine_overall_status(checks: &[ComponentHealth]) -> &'static str {
    if checks.iter().any(|c| c.status == "unhealthy") {
        "unhealthy"
    } else if checks.iter().any(|c| c.status == "degraded") {
        "degraded"
    } else {
        "healthy"
    }
}
