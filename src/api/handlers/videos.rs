use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::error::CaptionError;
use crate::videos::{VideoInfo, content_type_for};

#[tracing::instrument(skip(state))]
pub async fn list_videos_handler(State(state): State<AppState>) -> Json<Vec<VideoInfo>> {
    let orchestrator = &state.orchestrator;
    let mut videos = Vec::new();

    for path in state.library.list() {
        match state
            .library
            .describe(&path, orchestrator.cache(), orchestrator.registry())
            .await
        {
            Ok(info) => videos.push(info),
            // removed between listing and inspection
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    Json(videos)
}

#[tracing::instrument(skip(state))]
pub async fn video_info_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<VideoInfo>, ApiError> {
    let path = state.library.resolve(&filename)?;
    let info = state
        .library
        .describe(&path, state.orchestrator.cache(), state.orchestrator.registry())
        .await?;
    Ok(Json(info))
}

#[tracing::instrument(skip(state))]
pub async fn stream_video_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state.library.resolve(&filename)?;
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| CaptionError::SourceNotFound(path.clone()))?;
    let length = file.metadata().await.map_err(CaptionError::Io)?.len();

    let headers = [
        (header::CONTENT_TYPE, content_type_for(&path).to_string()),
        (header::CONTENT_LENGTH, length.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", filename),
        ),
    ];

    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}
