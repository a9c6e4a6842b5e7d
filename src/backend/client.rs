use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{CaptionBackend, GenerationOutput, GenerationRequest, HealthReport, ProtocolFactory, WireInput};
use crate::config::BackendConfig;
use crate::error::{CaptionError, Result};
use crate::registry::ModelDescriptor;

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<Value>,
}

/// HTTP client for the remote inference services.
///
/// Holds no per-model state: every call receives the model it targets.
pub struct HttpBackendClient {
    client: Client,
    health_client: Client,
    media_base_url: String,
    request_timeout: Duration,
}

impl HttpBackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CaptionError::Config(format!("Failed to build HTTP client: {}", e)))?;
        let health_client = Client::builder()
            .timeout(Duration::from_secs(config.health_timeout_secs))
            .build()
            .map_err(|e| CaptionError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            health_client,
            media_base_url: config.media_base_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    /// URL under which the inference service fetches a media file
    pub fn media_url(&self, filename: &str) -> String {
        format!("{}/{}", self.media_base_url, filename)
    }

    fn transport_error(&self, model: &ModelDescriptor, error: reqwest::Error) -> CaptionError {
        if error.is_timeout() {
            CaptionError::InferenceTimeout {
                model: model.key.clone(),
                timeout_secs: self.request_timeout.as_secs(),
            }
        } else {
            CaptionError::BackendUnavailable(format!("{} ({}): {}", model.key, model.base_url, error))
        }
    }
}

#[async_trait]
impl CaptionBackend for HttpBackendClient {
    async fn generate(&self, model: &ModelDescriptor, request: &GenerationRequest) -> Result<GenerationOutput> {
        let protocol = ProtocolFactory::create(model.protocol);
        let input = WireInput {
            video_url: self.media_url(&request.video_filename),
            audio_url: request
                .audio_filename
                .as_deref()
                .filter(|_| model.protocol.supports_audio())
                .map(|audio| self.media_url(audio)),
            prompt: request.prompt.clone(),
        };

        info!(
            model = %model.key,
            endpoint = %protocol.endpoint(model),
            video = %request.video_filename,
            with_audio = input.audio_url.is_some(),
            "Requesting caption"
        );

        let start = Instant::now();
        let response = protocol
            .build_request(&self.client, model, &input)
            .send()
            .await
            .map_err(|e| self.transport_error(model, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(model, e))?;

        if !status.is_success() {
            warn!(model = %model.key, status = status.as_u16(), "Model service returned an error");
            return Err(CaptionError::BackendError {
                status: status.as_u16(),
                body,
            });
        }

        debug!(model = %model.key, bytes = body.len(), "Received model response");
        let parsed = protocol.parse_response(&body)?;
        let processing_time = start.elapsed().as_secs_f64();

        info!(model = %model.key, seconds = processing_time, "Caption generated");

        Ok(GenerationOutput {
            caption: parsed.caption,
            processing_time,
            model: model.name.clone(),
            usage: parsed.usage,
        })
    }

    async fn health_check(&self, model: &ModelDescriptor) -> HealthReport {
        let url = format!("{}/v1/models", model.base_url);

        let response = match self.health_client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                return HealthReport {
                    healthy: false,
                    detail: e.to_string(),
                    models: Vec::new(),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            return HealthReport {
                healthy: false,
                detail: format!("{} returned {}", url, status),
                models: Vec::new(),
            };
        }

        let models = response
            .json::<ModelList>()
            .await
            .map(|list| list.data)
            .unwrap_or_default();

        HealthReport {
            healthy: true,
            detail: format!("{} reachable", model.base_url),
            models,
        }
    }
}
