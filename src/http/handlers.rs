//! Telemetry endpoint handlers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::error::{HostwatchError, Result};
use crate::ratelimit::RateLimiterBackend;
use crate::telemetry::{
    CpuInfo, DiskReport, HostProbe, LoadReport, MemoryReport, SystemReport,
};

/// State shared by the telemetry handlers.
#[derive(Clone)]
pub struct AppState {
    probe: Arc<HostProbe>,
    limiter: Arc<dyn RateLimiterBackend>,
}

impl AppState {
    /// Create handler state.
    pub fn new(probe: Arc<HostProbe>, limiter: Arc<dyn RateLimiterBackend>) -> Self {
        Self { probe, limiter }
    }

    /// Run a blocking collection on the blocking thread pool.
    async fn collect<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&HostProbe) -> T + Send + 'static,
        T: Send + 'static,
    {
        let probe = Arc::clone(&self.probe);
        tokio::task::spawn_blocking(move || f(&probe))
            .await
            .map_err(|e| HostwatchError::Telemetry(format!("collection task failed: {}", e)))
    }
}

impl IntoResponse for HostwatchError {
    fn into_response(self) -> Response {
        error!(error = %self, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Physical memory and swap usage.
pub async fn memory(State(state): State<AppState>) -> Result<Json<MemoryReport>> {
    state.collect(|probe| probe.memory()).await.map(Json)
}

/// Usage of every mounted filesystem.
pub async fn disks(State(state): State<AppState>) -> Result<Json<DiskReport>> {
    state.collect(|probe| probe.disks()).await.map(Json)
}

/// CPU utilisation. The `detailed` request header selects the fields:
/// `0` rounded only, `1` raw only, anything else both.
pub async fn cpu_percent(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let usage = state.collect(|probe| probe.cpu_usage()).await?;

    let detailed = headers
        .get("detailed")
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    let body = match detailed {
        Some("0") => json!({ "usage_percentage": usage.usage_percentage }),
        Some("1") => json!({ "detailed_usage_percentage": usage.detailed_usage_percentage }),
        _ => json!({
            "detailed_usage_percentage": usage.detailed_usage_percentage,
            "usage_percentage": usage.usage_percentage,
        }),
    };
    Ok(Json(body))
}

/// Model, vendor, clock speed and core count.
pub async fn cpu_info(State(state): State<AppState>) -> Result<Json<CpuInfo>> {
    state.collect(|probe| probe.cpu_info()).await?.map(Json)
}

/// Host, operating system and uptime.
pub async fn system(State(state): State<AppState>) -> Result<Json<SystemReport>> {
    state.collect(|probe| probe.system()).await.map(Json)
}

/// One, five and fifteen minute load averages.
pub async fn load(State(state): State<AppState>) -> Result<Json<LoadReport>> {
    state.collect(|probe| probe.load()).await.map(Json)
}

/// Process resource usage together with rate limiter activity.
pub async fn metrics(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let process = state.collect(|probe| probe.process()).await?;
    let rate_limiter = state.limiter.stats();

    Ok(Json(json!({
        "process": process,
        "rate_limiter": rate_limiter,
    })))
}

/// Liveness check with the current UTC time.
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
