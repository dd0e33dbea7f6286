use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::error::GatewayResult;
use crate::http::server::AppState;
use crate::registry::ServiceStatus;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub services: usize,
    pub healthy_services: usize,
}

#[derive(Debug, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub base_url: String,
    pub health_path: String,
    pub status: ServiceStatus,
    pub last_checked: Option<u64>,
    pub last_response_time_ms: u128,
    pub success_count: u64,
    pub error_count: u64,
    pub requests_ok: u64,
    pub requests_failed: u64,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub healthy: bool,
    pub status: ServiceStatus,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let staleness = state.config.health_check.staleness();
    let services = state.registry.list_all();
    let healthy_services = services
        .iter()
        .filter(|s| s.status(staleness) == ServiceStatus::Healthy)
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        services: services.len(),
        healthy_services,
    })
}

pub async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceSummary>> {
    let staleness = state.config.health_check.staleness();
    let services = state
        .registry
        .list_all()
        .into_iter()
        .map(|s| ServiceSummary {
            status: s.status(staleness),
            last_checked: s.last_checked_unix(),
            last_response_time_ms: s.last_response_time.as_millis(),
            name: s.name().to_string(),
            base_url: s.base_url,
            health_path: s.health_path,
            success_count: s.success_count,
            error_count: s.error_count,
            requests_ok: s.requests_ok,
            requests_failed: s.requests_failed,
        })
        .collect();
    Json(services)
}

/// Probe one service now, bypassing the tick.
pub async fn check_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> GatewayResult<Json<CheckResult>> {
    let healthy = state.monitor.check_service(&name).await?;
    let status = state
        .registry
        .get(&name)?
        .status(state.config.health_check.staleness());
    tracing::info!(service = %name, healthy, "On-demand health check");
    Ok(Json(CheckResult {
        name,
        healthy,
        status,
    }))
}

pub async fn deregister_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> GatewayResult<StatusCode> {
    state.registry.deregister(&name)?;
    Ok(StatusCode::NO_CONTENT)
}
