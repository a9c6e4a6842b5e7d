use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

use super::{MediaCommandBuilder, MediaProber};
use crate::error::{CaptionError, Result};

/// Parsed `ffprobe -show_streams -show_format` output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub codec_name: Option<String>,
    /// ffprobe reports numbers as strings
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeFormat {
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub format_name: Option<String>,
}

impl ProbeReport {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Video stream duration when positive, else container duration.
    pub fn duration(&self) -> Option<f64> {
        let stream_duration = self
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .and_then(|s| parse_seconds(s.duration.as_deref()))
            .filter(|d| *d > 0.0);

        stream_duration.or_else(|| {
            self.format
                .as_ref()
                .and_then(|f| parse_seconds(f.duration.as_deref()))
        })
    }

    pub fn audio_stream_count(&self) -> usize {
        self.streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some("audio"))
            .count()
    }
}

fn parse_seconds(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite())
}

/// ffprobe-backed prober
pub struct FfprobeProber {
    command_builder: MediaCommandBuilder,
}

impl FfprobeProber {
    pub fn new(command_builder: MediaCommandBuilder) -> Self {
        Self { command_builder }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeReport> {
        if !path.exists() {
            return Err(CaptionError::SourceNotFound(path.to_path_buf()));
        }

        let output = self.command_builder.probe(path).run().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptionError::Media(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        let report = ProbeReport::from_json(&String::from_utf8_lossy(&output.stdout))?;
        debug!(
            path = %path.display(),
            streams = report.streams.len(),
            "Probed media file"
        );
        Ok(report)
    }

    async fn probe_duration(&self, path: &Path) -> Option<f64> {
        match self.probe(path).await {
            Ok(report) => report.duration(),
            Err(e) => {
                warn!("Error getting video duration for {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn has_audio_stream(&self, path: &Path) -> bool {
        match self.probe(path).await {
            Ok(report) => report.audio_stream_count() > 0,
            Err(e) => {
                warn!("Could not probe audio streams of {}: {}", path.display(), e);
                false
            }
        }
    }
}
