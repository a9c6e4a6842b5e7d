// Media inspection and audio extraction
//
// Both operations shell out to external tools:
// - Probe: ffprobe stream/format inspection (duration, audio presence)
// - Extract: ffmpeg conversion of the audio track to a sibling WAV file
// - Commands: command builders shared by both

pub mod commands;
pub mod extract;
pub mod probe;


use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub use commands::*;
pub use extract::FfmpegAudioExtractor;
pub use probe::{FfprobeProber, ProbeFormat, ProbeReport, ProbeStream};

use crate::config::MediaConfig;
use crate::error::{CaptionError, Result};

/// Extension of the audio artifact derived from a video
pub const AUDIO_EXTENSION: &str = "wav";

/// Inspects local media files
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Full stream/format report
    async fn probe(&self, path: &Path) -> Result<ProbeReport>;

    /// Duration in seconds, absent when the file reports none or cannot be probed
    async fn probe_duration(&self, path: &Path) -> Option<f64>;

    /// Whether at least one audio stream is present (false when probing fails)
    async fn has_audio_stream(&self, path: &Path) -> bool;
}

/// Converts a video's audio track into a standalone waveform file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Extract to `output_path`, replacing whatever is there, and return it
    async fn extract_audio(&self, video_path: &Path, output_path: &Path) -> Result<PathBuf>;
}

/// Where the audio artifact of a video lives: same directory, same stem.
pub fn audio_artifact_path(video_path: &Path) -> PathBuf {
    video_path.with_extension(AUDIO_EXTENSION)
}

/// Factory for the ffmpeg-backed media implementations
pub struct MediaFactory;

impl MediaFactory {
    pub fn create_prober(config: &MediaConfig) -> Arc<dyn MediaProber> {
        Arc::new(FfprobeProber::new(Self::command_builder(config)))
    }

    pub fn create_extractor(config: &MediaConfig, prober: Arc<dyn MediaProber>) -> Arc<dyn AudioExtractor> {
        Arc::new(FfmpegAudioExtractor::new(Self::command_builder(config), prober))
    }

    fn command_builder(config: &MediaConfig) -> MediaCommandBuilder {
        MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path)
    }
}

/// Check that ffmpeg can be executed and return its version line
pub async fn check_availability(config: &MediaConfig) -> Result<String> {
    let builder = MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path);
    let output = builder
        .version_check()
        .run()
        .await
        .map_err(|e| CaptionError::Media(format!("ffmpeg not found: {}", e)))?;

    if output.status.success() {
        let version_info = String::from_utf8_lossy(&output.stdout);
        let first_line = version_info.lines().next().unwrap_or("Unknown version").to_string();
        info!("Media processor is available: {}", first_line);
        Ok(first_line)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("ffmpeg version check failed: {}", stderr.trim());
        Err(CaptionError::Media(format!("ffmpeg version check failed: {}", stderr.trim())))
    }
}
