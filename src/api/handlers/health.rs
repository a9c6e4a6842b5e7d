use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::state::AppState;

#[derive(Serialize)]
pub struct ServiceBanner {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend_healthy: bool,
    pub model_service_healthy: bool,
    pub model_service_url: String,
    pub model_service_detail: String,
}

pub async fn root_handler() -> Json<ServiceBanner> {
    Json(ServiceBanner {
        service: "Video Caption Service",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

/// This process is up; the default model's backend may not be.
#[tracing::instrument(skip(state))]
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let model = state
        .orchestrator
        .registry()
        .get(&state.config.default_model)?;
    let report = state.backend.health_check(model).await;

    Ok(Json(HealthResponse {
        status: if report.healthy { "healthy" } else { "degraded" }.to_string(),
        backend_healthy: true,
        model_service_healthy: report.healthy,
        model_service_url: model.base_url.clone(),
        model_service_detail: report.detail,
    }))
}
