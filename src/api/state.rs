use std::sync::Arc;

use crate::backend::{CaptionBackend, HttpBackendClient};
use crate::cache::CaptionCache;
use crate::config::Config;
use crate::error::Result;
use crate::media::{AudioExtractor, MediaFactory, MediaProber};
use crate::orchestrator::CaptionOrchestrator;
use crate::registry::ModelRegistry;
use crate::videos::VideoLibrary;

/// Everything a request handler needs, shared across requests
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<CaptionOrchestrator>,
    pub library: Arc<VideoLibrary>,
    pub backend: Arc<dyn CaptionBackend>,
}

impl AppState {
    pub fn new(
        config: Config,
        backend: Arc<dyn CaptionBackend>,
        prober: Arc<dyn MediaProber>,
        extractor: Arc<dyn AudioExtractor>,
    ) -> Result<Self> {
        let registry = Arc::new(ModelRegistry::from_config(&config));
        let cache = Arc::new(CaptionCache::new(&config.storage.captions_dir)?);
        let library = Arc::new(VideoLibrary::new(&config.storage.videos_dir, prober));
        let orchestrator = Arc::new(CaptionOrchestrator::new(
            registry,
            cache,
            Arc::clone(&backend),
            extractor,
            config.storage.videos_dir.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            orchestrator,
            library,
            backend,
        })
    }

    /// Wire the HTTP backend client and the ffmpeg tools
    pub fn from_config(config: Config) -> Result<Self> {
        let backend: Arc<dyn CaptionBackend> = Arc::new(HttpBackendClient::new(&config.backend)?);
        let prober = MediaFactory::create_prober(&config.media);
        let extractor = MediaFactory::create_extractor(&config.media, Arc::clone(&prober));
        Self::new(config, backend, prober, extractor)
    }
}
