// Remote inference backends
//
// Requests are shaped by a wire protocol chosen from the model's protocol family:
// - Chat: OpenAI-style chat completions with multipart message content
// - VideoInference: form-encoded `/infer/video` endpoint
//
// To support a new backend family:
// 1. Add a variant to `ProtocolFamily`
// 2. Implement `WireProtocol` for it
// 3. Return it from `ProtocolFactory::create`
// New models of an existing family only need a registry entry.

pub mod chat;
pub mod client;
pub mod video_infer;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{Map, Value};

pub use client::HttpBackendClient;

use crate::error::Result;
use crate::registry::{ModelDescriptor, ProtocolFamily};

/// What the orchestrator asks a backend to caption
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub video_filename: String,
    pub prompt: String,
    /// Sibling audio artifact, only for models that take a separate audio channel
    pub audio_filename: Option<String>,
}

/// Normalized backend answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutput {
    pub caption: String,
    /// Wall-clock seconds for the whole request/response cycle
    pub processing_time: f64,
    /// Canonical model name
    pub model: String,
    /// Token accounting as reported by the backend, empty when not reported
    pub usage: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<Value>,
}

/// Caption generation against a remote model service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    async fn generate(&self, model: &ModelDescriptor, request: &GenerationRequest) -> Result<GenerationOutput>;

    /// Short probe of the backend; failures are reported, never raised
    async fn health_check(&self, model: &ModelDescriptor) -> HealthReport;
}

/// Resolved media references and prompt handed to a wire protocol
#[derive(Debug, Clone, PartialEq)]
pub struct WireInput {
    pub video_url: String,
    pub audio_url: Option<String>,
    pub prompt: String,
}

/// Caption and usage pulled out of a backend response body
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCaption {
    pub caption: String,
    pub usage: Map<String, Value>,
}

/// Request shape and response decoding for one protocol family
pub trait WireProtocol: Send + Sync {
    fn family(&self) -> ProtocolFamily;

    /// Full URL of the generation endpoint for `model`
    fn endpoint(&self, model: &ModelDescriptor) -> String;

    fn build_request(&self, client: &Client, model: &ModelDescriptor, input: &WireInput) -> RequestBuilder;

    fn parse_response(&self, body: &str) -> Result<ParsedCaption>;
}

/// Factory for wire protocol implementations
pub struct ProtocolFactory;

impl ProtocolFactory {
    pub fn create(family: ProtocolFamily) -> Box<dyn WireProtocol> {
        match family {
            ProtocolFamily::ChatCompletions => Box::new(chat::ChatCompletionsProtocol),
            ProtocolFamily::VideoInference => Box::new(video_infer::VideoInferenceProtocol),
        }
    }
}
