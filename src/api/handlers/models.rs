use axum::Json;
use axum::extract::State;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::api::state::AppState;

#[derive(Serialize)]
pub struct AvailableModelsResponse {
    pub models: Map<String, Value>,
    pub default: String,
}

pub async fn available_models_handler(State(state): State<AppState>) -> Json<AvailableModelsResponse> {
    let models = state
        .orchestrator
        .registry()
        .iter()
        .map(|model| {
            (
                model.key.clone(),
                json!({
                    "name": model.name,
                    "url": model.base_url,
                    "display_name": model.display_name,
                    "protocol": model.protocol,
                    "requires_audio": model.requires_audio,
                }),
            )
        })
        .collect();

    Json(AvailableModelsResponse {
        models,
        default: state.config.default_model.clone(),
    })
}
