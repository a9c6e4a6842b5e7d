use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::CaptionError;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Error returned by handlers, rendered as `{"detail": ...}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }
}

pub fn status_for(error: &CaptionError) -> StatusCode {
    match error {
        CaptionError::SourceNotFound(_) => StatusCode::NOT_FOUND,
        CaptionError::UnknownModel { .. }
        | CaptionError::InvalidFilename(_)
        | CaptionError::AudioRequired { .. } => StatusCode::BAD_REQUEST,
        CaptionError::VideoConstraint(_) => StatusCode::PAYLOAD_TOO_LARGE,
        CaptionError::InferenceTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        CaptionError::BackendError { .. }
        | CaptionError::BackendUnavailable(_)
        | CaptionError::InvalidResponse(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CaptionError> for ApiError {
    fn from(error: CaptionError) -> Self {
        let status = status_for(&error);
        let detail = match &error {
            // keep server paths out of responses
            CaptionError::SourceNotFound(_) => "Video not found".to_string(),
            _ => error.to_string(),
        };
        Self { status, detail }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), detail = %self.detail, "Request failed");
        } else {
            tracing::debug!(status = self.status.as_u16(), detail = %self.detail, "Request rejected");
        }

        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}
