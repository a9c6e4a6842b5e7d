//! The local video directory: listing, lookup and upload constraints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cache::CaptionCache;
use crate::config::LimitsConfig;
use crate::error::{CaptionError, Result};
use crate::media::MediaProber;
use crate::registry::ModelRegistry;

/// Extensions served as videos, compared case-insensitively
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "flv"];

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub filename: String,
    /// Size in bytes
    pub size: u64,
    /// Duration in seconds
    pub duration: Option<f64>,
    pub has_caption: bool,
    /// Text of the first cached caption, in registry order
    pub caption_text: Option<String>,
    /// Comma-joined keys of the models with a cached caption
    pub model_used: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// A bare file name: no separators, not `.` or `..`
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0'])
    {
        return Err(CaptionError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

/// Content type used when streaming a video back to a client
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("flv") => "video/x-flv",
        _ => "application/octet-stream",
    }
}

pub struct VideoLibrary {
    videos_dir: PathBuf,
    prober: Arc<dyn MediaProber>,
}

impl VideoLibrary {
    pub fn new<P: AsRef<Path>>(videos_dir: P, prober: Arc<dyn MediaProber>) -> Self {
        Self {
            videos_dir: videos_dir.as_ref().to_path_buf(),
            prober,
        }
    }

    pub fn videos_dir(&self) -> &Path {
        &self.videos_dir
    }

    /// Video files directly under the videos directory, newest first.
    pub fn list(&self) -> Vec<PathBuf> {
        if !self.videos_dir.is_dir() {
            debug!("Videos directory {} does not exist", self.videos_dir.display());
            return Vec::new();
        }

        let mut videos: Vec<(SystemTime, PathBuf)> = WalkDir::new(&self.videos_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && is_video_file(entry.path()))
            .map(|entry| {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, entry.into_path())
            })
            .collect();

        videos.sort_by(|a, b| b.0.cmp(&a.0));
        videos.into_iter().map(|(_, path)| path).collect()
    }

    /// Path of a video inside the library. Names that could escape the
    /// directory are rejected.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;

        let path = self.videos_dir.join(filename);
        if !path.is_file() {
            return Err(CaptionError::SourceNotFound(path));
        }
        Ok(path)
    }

    pub async fn describe(&self, path: &Path, cache: &CaptionCache, registry: &ModelRegistry) -> Result<VideoInfo> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| CaptionError::SourceNotFound(path.to_path_buf()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let captions = cache.load_all(&filename, registry);
        let model_used = if captions.is_empty() {
            None
        } else {
            Some(
                captions
                    .iter()
                    .map(|c| c.model_key.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            )
        };

        Ok(VideoInfo {
            size: metadata.len(),
            duration: self.prober.probe_duration(path).await,
            has_caption: !captions.is_empty(),
            caption_text: captions.first().map(|c| c.record.caption.clone()),
            model_used,
            created_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            filename,
        })
    }

    /// Size is checked before duration; an unknown duration passes.
    pub async fn validate_constraints(&self, path: &Path, limits: &LimitsConfig) -> Result<()> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| CaptionError::SourceNotFound(path.to_path_buf()))?;

        let size_mb = metadata.len() as f64 / BYTES_PER_MB;
        if size_mb > limits.max_video_size_mb as f64 {
            return Err(CaptionError::VideoConstraint(format!(
                "Video size ({:.1}MB) exceeds limit of {}MB",
                size_mb, limits.max_video_size_mb
            )));
        }

        match self.prober.probe_duration(path).await {
            Some(duration) if duration > limits.max_video_duration_sec as f64 => {
                Err(CaptionError::VideoConstraint(format!(
                    "Video duration ({:.1}s) exceeds limit of {}s",
                    duration, limits.max_video_duration_sec
                )))
            }
            Some(_) => Ok(()),
            None => {
                warn!("Duration of {} unknown, skipping duration limit", path.display());
                Ok(())
            }
        }
    }
}
