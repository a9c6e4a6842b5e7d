use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{CaptionError, Result};
use crate::registry::ProtocolFamily;

/// Configuration file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "vidcap.toml";

// Default values for optional sections
fn default_request_timeout_secs() -> u64 {
    300
}

fn default_health_timeout_secs() -> u64 {
    5
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".vidcap/log")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model used when a request does not name one
    pub default_model: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub backend: BackendConfig,
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the source videos (and their extracted audio)
    pub videos_dir: PathBuf,
    /// Directory holding one JSON caption file per (video, model)
    pub captions_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL under which the inference services can fetch videos and audio
    pub media_base_url: String,
    /// Bound on a whole generation request/response cycle
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Bound on a health probe
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_video_size_mb: u64,
    pub max_video_duration_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the daily rolling log file
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { dir: default_log_dir() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Short identifier used in requests and cache file names
    pub key: String,
    /// Canonical model name sent to the backend
    pub name: String,
    /// Backend base URL
    pub url: String,
    pub display_name: String,
    pub protocol: ProtocolFamily,
    /// Whether the model takes the audio track as a separate input
    #[serde(default)]
    pub requires_audio: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prompt: Option<String>,
}

impl ModelConfig {
    fn builtin(
        key: &str,
        name: &str,
        url: &str,
        display_name: &str,
        protocol: ProtocolFamily,
        requires_audio: bool,
    ) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            display_name: display_name.to_string(),
            protocol,
            requires_audio,
            max_tokens: None,
            temperature: None,
            top_p: None,
            default_prompt: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: "qwen2vl".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8011,
            },
            storage: StorageConfig {
                videos_dir: PathBuf::from("/app/videos"),
                captions_dir: PathBuf::from("/app/captions"),
            },
            media: MediaConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
            },
            backend: BackendConfig {
                media_base_url: "http://127.0.0.1:8080".to_string(),
                request_timeout_secs: default_request_timeout_secs(),
                health_timeout_secs: default_health_timeout_secs(),
            },
            limits: LimitsConfig {
                max_video_size_mb: 100,
                max_video_duration_sec: 300,
            },
            logging: LoggingConfig::default(),
            models: vec![
                ModelConfig::builtin(
                    "qwen2vl",
                    "Qwen/Qwen2-VL-7B-Instruct",
                    "http://localhost:8000",
                    "Qwen2-VL-7B",
                    ProtocolFamily::ChatCompletions,
                    false,
                ),
                ModelConfig::builtin(
                    "omnivinci",
                    "nvidia/omnivinci",
                    "http://localhost:8001",
                    "OmniVinci",
                    ProtocolFamily::VideoInference,
                    false,
                ),
                ModelConfig::builtin(
                    "qwen3omni",
                    "Qwen/Qwen3-Omni-30B-A3B-Instruct",
                    "http://localhost:8002",
                    "Qwen3-Omni-30B",
                    ProtocolFamily::ChatCompletions,
                    true,
                ),
            ],
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CaptionError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| CaptionError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CaptionError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| CaptionError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Load from an explicit file, else `vidcap.toml` in the working directory,
    /// else defaults; then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                    Config::from_file(DEFAULT_CONFIG_FILE)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from environment-style variables.
    ///
    /// `lookup` is usually `std::env::var`; any function mapping a variable name
    /// to its value works, which keeps this testable without touching the
    /// process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("DEFAULT_MODEL") {
            self.default_model = model;
        }
        if let Some(dir) = lookup("VIDEOS_DIR") {
            self.storage.videos_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("CAPTIONS_DIR") {
            self.storage.captions_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("REMOTE_VIDEO_URL") {
            self.backend.media_base_url = url;
        }
        if let Some(value) = parse_var(&lookup, "MAX_VIDEO_SIZE_MB") {
            self.limits.max_video_size_mb = value;
        }
        if let Some(value) = parse_var(&lookup, "MAX_VIDEO_DURATION_SEC") {
            self.limits.max_video_duration_sec = value;
        }
        if let Some(port) = parse_var(&lookup, "BACKEND_PORT") {
            self.server.port = port;
        }

        for model in &mut self.models {
            let prefix = model.key.to_uppercase();
            if let Some(url) = lookup(&format!("{}_API_URL", prefix)) {
                model.url = url;
            }
            if let Some(value) = parse_var(&lookup, &format!("{}_MAX_TOKENS", prefix)) {
                model.max_tokens = Some(value);
            }
            if let Some(value) = parse_var(&lookup, &format!("{}_TEMPERATURE", prefix)) {
                model.temperature = Some(value);
            }
            if let Some(value) = parse_var(&lookup, &format!("{}_TOP_P", prefix)) {
                model.top_p = Some(value);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(CaptionError::Config("At least one model must be configured".to_string()));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if model.key.trim().is_empty() {
                return Err(CaptionError::Config("Model key must not be empty".to_string()));
            }
            if !seen.insert(model.key.as_str()) {
                return Err(CaptionError::Config(format!("Duplicate model key: {}", model.key)));
            }
        }

        if !seen.contains(self.default_model.as_str()) {
            return Err(CaptionError::Config(format!(
                "Default model {} is not among the configured models",
                self.default_model
            )));
        }

        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}
