use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::{AudioExtractor, MediaCommandBuilder, MediaProber};
use crate::error::{CaptionError, Result};

/// ffmpeg-backed audio extractor.
///
/// Output goes to a hidden temporary file next to the destination and is
/// renamed into place only after ffmpeg succeeds.
pub struct FfmpegAudioExtractor {
    command_builder: MediaCommandBuilder,
    prober: Arc<dyn MediaProber>,
}

impl FfmpegAudioExtractor {
    pub fn new(command_builder: MediaCommandBuilder, prober: Arc<dyn MediaProber>) -> Self {
        Self {
            command_builder,
            prober,
        }
    }
}

/// ffmpeg's wording when the selected output would end up with no stream at all.
fn refused_for_missing_audio(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("does not contain any stream") || stderr.contains("matches no streams")
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract_audio(&self, video_path: &Path, output_path: &Path) -> Result<PathBuf> {
        if !video_path.exists() {
            return Err(CaptionError::SourceNotFound(video_path.to_path_buf()));
        }

        match self.prober.probe(video_path).await {
            Ok(report) if report.audio_stream_count() == 0 => {
                return Err(CaptionError::NoAudioTrack(video_path.to_path_buf()));
            }
            Ok(_) => {}
            Err(e) => warn!(
                "Pre-flight probe of {} failed, attempting extraction anyway: {}",
                video_path.display(),
                e
            ),
        }

        info!("Extracting audio from {} to {}", video_path.display(), output_path.display());

        let output_dir = match output_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let staging = tempfile::Builder::new()
            .prefix(".vidcap-audio-")
            .suffix(".wav.part")
            .tempfile_in(output_dir)
            .map_err(|e| CaptionError::ExtractionFailed(format!("Failed to create staging file: {}", e)))?;

        let output = self
            .command_builder
            .extract_audio(video_path, staging.path())
            .run()
            .await
            .map_err(|e| CaptionError::ExtractionFailed(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if refused_for_missing_audio(&stderr) {
                return Err(CaptionError::NoAudioTrack(video_path.to_path_buf()));
            }
            return Err(CaptionError::ExtractionFailed(stderr.trim().to_string()));
        }

        staging
            .persist(output_path)
            .map_err(|e| CaptionError::ExtractionFailed(format!("Failed to move audio into place: {}", e.error)))?;

        info!("Audio extraction completed");
        Ok(output_path.to_path_buf())
    }
}
