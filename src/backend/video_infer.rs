use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Map;

use super::{ParsedCaption, WireInput, WireProtocol};
use crate::error::{CaptionError, Result};
use crate::registry::{ModelDescriptor, ProtocolFamily};

#[derive(Debug, Deserialize)]
struct VideoInferenceResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

/// Bespoke `/infer/video` endpoint: form-encoded video URL and prompt, no audio channel
pub struct VideoInferenceProtocol;

impl VideoInferenceProtocol {
    pub fn form_fields(input: &WireInput) -> [(&'static str, String); 2] {
        [("url", input.video_url.clone()), ("prompt", input.prompt.clone())]
    }
}

impl WireProtocol for VideoInferenceProtocol {
    fn family(&self) -> ProtocolFamily {
        ProtocolFamily::VideoInference
    }

    fn endpoint(&self, model: &ModelDescriptor) -> String {
        format!("{}/infer/video", model.base_url)
    }

    fn build_request(&self, client: &Client, model: &ModelDescriptor, input: &WireInput) -> RequestBuilder {
        client
            .post(self.endpoint(model))
            .form(&Self::form_fields(input))
    }

    fn parse_response(&self, body: &str) -> Result<ParsedCaption> {
        let response: VideoInferenceResponse = serde_json::from_str(body)
            .map_err(|e| CaptionError::InvalidResponse(format!("Failed to parse video inference response: {}", e)))?;

        Ok(ParsedCaption {
            caption: response.response.or(response.caption).unwrap_or_default(),
            usage: Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields_ignore_audio() {
        let input = WireInput {
            video_url: "http://127.0.0.1:8080/clip.mp4".to_string(),
            audio_url: Some("http://127.0.0.1:8080/clip.wav".to_string()),
            prompt: "Describe it.".to_string(),
        };
        let fields = VideoInferenceProtocol::form_fields(&input);
        assert_eq!(fields[0], ("url", "http://127.0.0.1:8080/clip.mp4".to_string()));
        assert_eq!(fields[1], ("prompt", "Describe it.".to_string()));
    }

    #[test]
    fn test_response_field_preferred_over_caption() {
        let parsed = VideoInferenceProtocol
            .parse_response(r#"{"response": "From response", "caption": "From caption"}"#)
            .unwrap();
        assert_eq!(parsed.caption, "From response");
        assert!(parsed.usage.is_empty());
    }

    #[test]
    fn test_caption_field_fallback() {
        let parsed = VideoInferenceProtocol
            .parse_response(r#"{"caption": "A chef plates a dessert."}"#)
            .unwrap();
        assert_eq!(parsed.caption, "A chef plates a dessert.");
    }

    #[test]
    fn test_neither_field_gives_empty_caption() {
        let parsed = VideoInferenceProtocol.parse_response(r#"{"status": "ok"}"#).unwrap();
        assert_eq!(parsed.caption, "");
    }
}
