use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::cache::{CachedCaption, CaptionRecord};
use crate::videos::validate_filename;

#[derive(Debug, Deserialize)]
pub struct GenerateParams {
    pub model: Option<String>,
    #[serde(default)]
    pub regenerate: bool,
    pub prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptionGenerateRequest {
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModelParam {
    pub model: Option<String>,
}

#[derive(Serialize)]
pub struct AllCaptionsResponse {
    pub filename: String,
    pub captions: Vec<CachedCaption>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub filename: String,
}

/// Generate-or-fetch. The prompt comes from the query string, else from an
/// optional JSON body.
#[tracing::instrument(skip(state, body))]
pub async fn generate_caption_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(params): Query<GenerateParams>,
    body: Bytes,
) -> Result<Json<CaptionRecord>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CaptionGenerateRequest::default()
    } else {
        serde_json::from_slice::<CaptionGenerateRequest>(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?
    };

    let path = state.library.resolve(&filename)?;
    state
        .library
        .validate_constraints(&path, &state.config.limits)
        .await?;

    let model = params
        .model
        .as_deref()
        .unwrap_or(&state.config.default_model);
    let prompt = params.prompt.as_deref().or(request.prompt.as_deref());

    let record = state
        .orchestrator
        .generate_or_fetch_detached(&filename, prompt, model, params.regenerate)
        .await?;
    Ok(Json(record))
}

#[tracing::instrument(skip(state))]
pub async fn all_captions_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<AllCaptionsResponse>, ApiError> {
    validate_filename(&filename)?;
    let captions = state.orchestrator.cached_all(&filename);

    Ok(Json(AllCaptionsResponse {
        filename,
        count: captions.len(),
        captions,
    }))
}

/// The given model's caption, or the first cached one in registry order.
#[tracing::instrument(skip(state))]
pub async fn get_caption_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(params): Query<ModelParam>,
) -> Result<Json<CaptionRecord>, ApiError> {
    validate_filename(&filename)?;

    let record = match params.model.as_deref() {
        Some(model) => state.orchestrator.cached(&filename, model)?,
        None => state
            .orchestrator
            .cached_all(&filename)
            .into_iter()
            .next()
            .map(|cached| cached.record),
    };

    record
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Caption not found. Generate one first."))
}

/// Delete the given model's caption, or every cached caption of the video.
#[tracing::instrument(skip(state))]
pub async fn delete_caption_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(params): Query<ModelParam>,
) -> Result<Json<DeleteResponse>, ApiError> {
    validate_filename(&filename)?;
    let orchestrator = &state.orchestrator;

    let deleted = match params.model.as_deref() {
        Some(model) => orchestrator.delete(&filename, model)?,
        None => {
            let mut any = false;
            for key in orchestrator.registry().keys() {
                any |= orchestrator.delete(&filename, key)?;
            }
            any
        }
    };

    if !deleted {
        return Err(ApiError::not_found("Caption not found"));
    }

    info!(video = %filename, model = ?params.model, "Caption deleted via API");
    Ok(Json(DeleteResponse {
        message: "Caption deleted successfully".to_string(),
        filename,
    }))
}
