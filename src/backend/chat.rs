use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ParsedCaption, WireInput, WireProtocol};
use crate::error::{CaptionError, Result};
use crate::registry::{ModelDescriptor, ProtocolFamily};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaUrl {
    pub url: String,
}

/// One element of a multipart message, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    VideoUrl { video_url: MediaUrl },
    AudioUrl { audio_url: MediaUrl },
    Text { text: String },
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/v1/chat/completions` (vLLM and friends)
pub struct ChatCompletionsProtocol;

impl ChatCompletionsProtocol {
    /// Single user turn: video, then audio when present, then the prompt.
    pub fn payload(model: &ModelDescriptor, input: &WireInput) -> ChatCompletionRequest {
        let mut content = vec![ContentPart::VideoUrl {
            video_url: MediaUrl {
                url: input.video_url.clone(),
            },
        }];
        if let Some(audio_url) = &input.audio_url {
            content.push(ContentPart::AudioUrl {
                audio_url: MediaUrl {
                    url: audio_url.clone(),
                },
            });
        }
        content.push(ContentPart::Text {
            text: input.prompt.clone(),
        });

        ChatCompletionRequest {
            model: model.name.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            max_tokens: model.generation.max_tokens,
            temperature: model.generation.temperature,
            top_p: model.generation.top_p,
        }
    }
}

impl WireProtocol for ChatCompletionsProtocol {
    fn family(&self) -> ProtocolFamily {
        ProtocolFamily::ChatCompletions
    }

    fn endpoint(&self, model: &ModelDescriptor) -> String {
        format!("{}/v1/chat/completions", model.base_url)
    }

    fn build_request(&self, client: &Client, model: &ModelDescriptor, input: &WireInput) -> RequestBuilder {
        client
            .post(self.endpoint(model))
            .json(&Self::payload(model, input))
    }

    fn parse_response(&self, body: &str) -> Result<ParsedCaption> {
        let response: ChatCompletionResponse = serde_json::from_str(body)
            .map_err(|e| CaptionError::InvalidResponse(format!("Failed to parse chat completion: {}", e)))?;

        let caption = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CaptionError::InvalidResponse("Chat completion has no message content".to_string()))?;

        Ok(ParsedCaption {
            caption,
            usage: response.usage.unwrap_or_default(),
        })
    }
}
