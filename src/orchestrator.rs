//! Generate-or-fetch composition of the cache, the media tools and the backends.

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, Instrument};

use crate::backend::{CaptionBackend, GenerationRequest};
use crate::cache::{CachedCaption, CaptionCache, CaptionRecord};
use crate::error::{CaptionError, Result};
use crate::media::{audio_artifact_path, AudioExtractor};
use crate::registry::{ModelDescriptor, ModelRegistry};
use crate::videos::validate_filename;

/// Caller prompt verbatim when it has content, else the model's default.
pub fn resolve_prompt(prompt: Option<&str>, model: &ModelDescriptor) -> String {
    match prompt {
        Some(p) if !p.trim().is_empty() => p.to_string(),
        _ => model.default_prompt().to_string(),
    }
}

/// Async mutual exclusion per string key; idle keys are dropped from the map.
#[derive(Default)]
struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

struct KeyedGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    async fn lock(&self, key: String) -> KeyedGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            // a lone map reference means the last waiter gave up before acquiring
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        let guard = Arc::clone(&slot).lock_owned().await;
        KeyedGuard {
            locks: self,
            key,
            slot,
            guard: Some(guard),
        }
    }

    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.locks.slots.lock().unwrap_or_else(|e| e.into_inner());
        // one reference in the map, one here: nobody else is waiting
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}

pub struct CaptionOrchestrator {
    registry: Arc<ModelRegistry>,
    cache: Arc<CaptionCache>,
    backend: Arc<dyn CaptionBackend>,
    extractor: Arc<dyn AudioExtractor>,
    videos_dir: PathBuf,
    locks: KeyedLocks,
}

impl CaptionOrchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        cache: Arc<CaptionCache>,
        backend: Arc<dyn CaptionBackend>,
        extractor: Arc<dyn AudioExtractor>,
        videos_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            cache,
            backend,
            extractor,
            videos_dir,
            locks: KeyedLocks::default(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CaptionCache {
        &self.cache
    }

    /// [`generate_or_fetch`](Self::generate_or_fetch) on its own task.
    ///
    /// Dropping the returned future does not cancel the work: the backend
    /// call, audio extraction and cache write run to completion.
    pub async fn generate_or_fetch_detached(
        self: &Arc<Self>,
        video_filename: &str,
        prompt: Option<&str>,
        model_key: &str,
        regenerate: bool,
    ) -> Result<CaptionRecord> {
        let orchestrator = Arc::clone(self);
        let video_filename = video_filename.to_string();
        let prompt = prompt.map(str::to_string);
        let model_key = model_key.to_string();

        let task = async move {
            orchestrator
                .generate_or_fetch(&video_filename, prompt.as_deref(), &model_key, regenerate)
                .await
        };

        tokio::spawn(task.instrument(tracing::Span::current()))
            .await
            .map_err(|e| CaptionError::InvariantViolation(format!("caption task failed: {}", e)))?
    }

    /// Return the cached caption for (video, model) unless `regenerate` is set,
    /// otherwise caption the video with the model and cache the result.
    pub async fn generate_or_fetch(
        &self,
        video_filename: &str,
        prompt: Option<&str>,
        model_key: &str,
        regenerate: bool,
    ) -> Result<CaptionRecord> {
        validate_filename(video_filename)?;
        let model = self.registry.get(model_key)?;
        let _guard = self
            .locks
            .lock(format!("caption:{}:{}", video_filename, model.key))
            .await;

        if !regenerate {
            if let Some(cached) = self.cache.load(video_filename, &model.key) {
                debug!(video = video_filename, model = %model.key, "Serving cached caption");
                return self.repair_prompt(cached, model);
            }
        }

        let prompt = resolve_prompt(prompt, model);

        let audio_filename = if model.uses_audio_channel() {
            Some(self.ensure_audio(video_filename, model).await?)
        } else {
            None
        };

        let output = self
            .backend
            .generate(
                model,
                &GenerationRequest {
                    video_filename: video_filename.to_string(),
                    prompt: prompt.clone(),
                    audio_filename,
                },
            )
            .await?;

        self.cache.save(CaptionRecord {
            filename: video_filename.to_string(),
            caption: output.caption,
            prompt,
            generated_at: Utc::now(),
            processing_time_seconds: output.processing_time,
            model_name: model.key.clone(),
            model_version: output.model,
        })
    }

    pub fn cached(&self, video_filename: &str, model_key: &str) -> Result<Option<CaptionRecord>> {
        validate_filename(video_filename)?;
        let model = self.registry.get(model_key)?;
        Ok(self.cache.load(video_filename, &model.key))
    }

    pub fn cached_all(&self, video_filename: &str) -> Vec<CachedCaption> {
        self.cache.load_all(video_filename, &self.registry)
    }

    pub fn delete(&self, video_filename: &str, model_key: &str) -> Result<bool> {
        validate_filename(video_filename)?;
        let model = self.registry.get(model_key)?;
        self.cache.delete(video_filename, &model.key)
    }

    /// Older cache entries may lack a prompt; fill in the model default and persist.
    fn repair_prompt(&self, mut record: CaptionRecord, model: &ModelDescriptor) -> Result<CaptionRecord> {
        if !record.prompt.trim().is_empty() {
            return Ok(record);
        }

        info!(
            video = %record.filename,
            model = %model.key,
            "Repairing cached caption without a prompt"
        );
        record.prompt = model.default_prompt().to_string();
        self.cache.save(record)
    }

    /// Make sure the audio artifact exists and return its file name.
    async fn ensure_audio(&self, video_filename: &str, model: &ModelDescriptor) -> Result<String> {
        let video_path = self.videos_dir.join(video_filename);
        let audio_path = audio_artifact_path(&video_path);
        let audio_filename = audio_artifact_path(Path::new(video_filename))
            .to_string_lossy()
            .to_string();

        let _guard = self.locks.lock(format!("audio:{}", video_filename)).await;
        if audio_path.exists() {
            return Ok(audio_filename);
        }

        info!(video = video_filename, model = %model.key, "Audio track required, extracting");
        match self.extractor.extract_audio(&video_path, &audio_path).await {
            Ok(_) => Ok(audio_filename),
            Err(CaptionError::NoAudioTrack(_)) => Err(CaptionError::AudioRequired {
                model: model.key.clone(),
            }),
            Err(e @ CaptionError::SourceNotFound(_)) => Err(e),
            Err(e) => Err(CaptionError::AudioExtractionFailed {
                video: video_filename.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
