//! On-disk caption cache: one JSON document per (video, model).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::{CaptionError, Result};
use crate::registry::ModelRegistry;

/// Persisted result of one caption generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionRecord {
    pub filename: String,
    pub caption: String,
    /// Older cache files may carry `null` here; those load as an empty prompt.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub prompt: String,
    pub generated_at: DateTime<Utc>,
    pub processing_time_seconds: f64,
    /// Model key
    pub model_name: String,
    /// Canonical model name reported by the backend configuration
    pub model_version: String,
}

/// A cached record annotated with the registry entry it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedCaption {
    #[serde(flatten)]
    pub record: CaptionRecord,
    pub model_key: String,
    pub model_display_name: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub struct CaptionCache {
    captions_dir: PathBuf,
}

impl CaptionCache {
    /// Open the cache rooted at `captions_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(captions_dir: P) -> Result<Self> {
        let captions_dir = captions_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&captions_dir).map_err(|e| {
            CaptionError::PersistenceFailed(format!(
                "Failed to create captions directory {}: {}",
                captions_dir.display(),
                e
            ))
        })?;
        Ok(Self { captions_dir })
    }

    pub fn captions_dir(&self) -> &Path {
        &self.captions_dir
    }

    /// `{captions_dir}/{video}_{model_key}.json`
    pub fn path_for(&self, video_filename: &str, model_key: &str) -> PathBuf {
        self.captions_dir
            .join(format!("{}_{}.json", video_filename, model_key))
    }

    pub fn exists(&self, video_filename: &str, model_key: &str) -> bool {
        self.path_for(video_filename, model_key).is_file()
    }

    /// Cached record, or `None` when absent or unreadable.
    pub fn load(&self, video_filename: &str, model_key: &str) -> Option<CaptionRecord> {
        let path = self.path_for(video_filename, model_key);
        if !path.exists() {
            return None;
        }

        match read_record(&path) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    video = video_filename,
                    model = model_key,
                    error = %e,
                    "Ignoring unreadable caption cache file"
                );
                None
            }
        }
    }

    /// Every readable cached caption of a video, in registry order.
    pub fn load_all(&self, video_filename: &str, registry: &ModelRegistry) -> Vec<CachedCaption> {
        registry
            .iter()
            .filter_map(|model| {
                self.load(video_filename, &model.key).map(|record| CachedCaption {
                    record,
                    model_key: model.key.clone(),
                    model_display_name: model.display_name.clone(),
                })
            })
            .collect()
    }

    /// Replace the record for `(record.filename, record.model_name)` in full.
    pub fn save(&self, record: CaptionRecord) -> Result<CaptionRecord> {
        if record.prompt.trim().is_empty() {
            error!(
                video = %record.filename,
                model = %record.model_name,
                "Refusing to persist a caption without a prompt"
            );
            return Err(CaptionError::InvariantViolation(format!(
                "caption for {} ({}) reached persistence without a prompt",
                record.filename, record.model_name
            )));
        }

        let path = self.path_for(&record.filename, &record.model_name);
        write_atomically(&self.captions_dir, &path, &record).map_err(|e| {
            CaptionError::PersistenceFailed(format!("{}: {}", path.display(), e))
        })?;

        info!("Caption saved: {}", path.display());
        Ok(record)
    }

    /// Remove a cached record; `false` when there was nothing to remove.
    pub fn delete(&self, video_filename: &str, model_key: &str) -> Result<bool> {
        let path = self.path_for(video_filename, model_key);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Caption deleted: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CaptionError::PersistenceFailed(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

fn read_record(path: &Path) -> Result<CaptionRecord> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_atomically(dir: &Path, path: &Path, record: &CaptionRecord) -> std::io::Result<()> {
    let mut staging = tempfile::Builder::new()
        .prefix(".caption-")
        .suffix(".json.part")
        .tempfile_in(dir)?;

    serde_json::to_writer_pretty(&mut staging, record)?;
    staging.write_all(b"\n")?;
    staging.as_file().sync_all()?;

    debug!("Renaming {} -> {}", staging.path().display(), path.display());
    staging.persist(path).map_err(|e| e.error)?;
    Ok(())
}
