//! Model registry: the fixed set of inference backends this process can talk to.

use serde::{Deserialize, Serialize};

use crate::config::{Config, ModelConfig};
use crate::error::{CaptionError, Result};

/// Prompt used when neither the caller nor the model provides one.
pub const GENERIC_DEFAULT_PROMPT: &str =
    "Describe this video in detail, including what you see, hear, and any actions taking place.";

pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 0.9;

/// Wire shape a backend expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolFamily {
    /// OpenAI-style `/v1/chat/completions` with multipart message content
    ChatCompletions,
    /// Form-encoded `/infer/video` endpoint taking a video URL and a prompt
    VideoInference,
}

impl ProtocolFamily {
    pub fn supports_audio(&self) -> bool {
        matches!(self, Self::ChatCompletions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    pub key: String,
    pub name: String,
    pub base_url: String,
    pub display_name: String,
    pub protocol: ProtocolFamily,
    pub requires_audio: bool,
    pub generation: GenerationParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_override: Option<String>,
}

impl ModelDescriptor {
    pub fn from_config(config: &ModelConfig) -> Self {
        let defaults = GenerationParams::default();
        Self {
            key: config.key.clone(),
            name: config.name.clone(),
            base_url: config.url.trim_end_matches('/').to_string(),
            display_name: config.display_name.clone(),
            protocol: config.protocol,
            requires_audio: config.requires_audio,
            generation: GenerationParams {
                max_tokens: config.max_tokens.unwrap_or(defaults.max_tokens),
                temperature: config.temperature.unwrap_or(defaults.temperature),
                top_p: config.top_p.unwrap_or(defaults.top_p),
            },
            prompt_override: config
                .default_prompt
                .clone()
                .filter(|p| !p.trim().is_empty()),
        }
    }

    /// Prompt substituted when the caller gives none.
    pub fn default_prompt(&self) -> &str {
        self.prompt_override
            .as_deref()
            .unwrap_or_else(|| default_prompt_for(&self.key))
    }

    /// Whether requests for this model carry a separate audio channel.
    pub fn uses_audio_channel(&self) -> bool {
        self.requires_audio && self.protocol.supports_audio()
    }
}

/// Built-in description prompt for a model key.
pub fn default_prompt_for(model_key: &str) -> &'static str {
    match model_key {
        "qwen2vl" => {
            "Describe this video in detail, including the setting, the people or objects in it, and any actions taking place."
        }
        "omnivinci" => {
            "Describe this video in detail, including what you see, what you hear, and any actions taking place."
        }
        "qwen3omni" => {
            "Watch the video and listen to its audio track. Describe in detail what you see, what is said or heard, and any actions taking place."
        }
        _ => GENERIC_DEFAULT_PROMPT,
    }
}

/// Read-only, ordered mapping from model key to descriptor.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
}

impl ModelRegistry {
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        Self { models }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.models.iter().map(ModelDescriptor::from_config).collect())
    }

    pub fn get(&self, key: &str) -> Result<&ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.key == key)
            .ok_or_else(|| CaptionError::UnknownModel {
                requested: key.to_string(),
                available: self.keys().join(", "),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
