use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Map, Value};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

use vidcap::api::{AppState, create_router};
use vidcap::backend::{CaptionBackend, GenerationOutput, GenerationRequest, HealthReport};
use vidcap::config::Config;
use vidcap::error::{CaptionError, Result};
use vidcap::media::{AudioExtractor, MediaProber, ProbeReport};
use vidcap::registry::ModelDescriptor;

enum Behavior {
    Caption,
    Slow(Duration),
    Timeout,
}

struct StubBackend {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl StubBackend {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CaptionBackend for StubBackend {
    async fn generate(&self, model: &ModelDescriptor, request: &GenerationRequest) -> Result<GenerationOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Behavior::Slow(delay) = self.behavior {
            tokio::time::sleep(delay).await;
        }
        match self.behavior {
            Behavior::Caption | Behavior::Slow(_) => Ok(GenerationOutput {
                caption: format!("Caption of {} by {}", request.video_filename, model.key),
                processing_time: 1.25,
                model: model.name.clone(),
                usage: Map::new(),
            }),
            Behavior::Timeout => Err(CaptionError::InferenceTimeout {
                model: model.key.clone(),
                timeout_secs: 300,
            }),
        }
    }

    async fn health_check(&self, model: &ModelDescriptor) -> HealthReport {
        HealthReport {
            healthy: true,
            detail: format!("{} reachable", model.base_url),
            models: Vec::new(),
        }
    }
}

struct StubProber;

#[async_trait::async_trait]
impl MediaProber for StubProber {
    async fn probe(&self, _path: &Path) -> Result<ProbeReport> {
        Ok(ProbeReport::default())
    }

    async fn probe_duration(&self, _path: &Path) -> Option<f64> {
        Some(30.0)
    }

    async fn has_audio_stream(&self, _path: &Path) -> bool {
        false
    }
}

/// Behaves like a video without any audio stream
struct SilentVideoExtractor;

#[async_trait::async_trait]
impl AudioExtractor for SilentVideoExtractor {
    async fn extract_audio(&self, video_path: &Path, _output_path: &Path) -> Result<PathBuf> {
        Err(CaptionError::NoAudioTrack(video_path.to_path_buf()))
    }
}

struct TestApp {
    router: Router,
    backend: Arc<StubBackend>,
    _videos: TempDir,
    captions: TempDir,
}

fn create_test_app_with(behavior: Behavior, configure: impl FnOnce(&mut Config)) -> TestApp {
    let videos = tempfile::tempdir().unwrap();
    let captions = tempfile::tempdir().unwrap();
    std::fs::write(videos.path().join("clip.mp4"), b"not really a video").unwrap();
    std::fs::write(videos.path().join("notes.txt"), b"ignored").unwrap();

    let mut config = Config::default();
    config.storage.videos_dir = videos.path().to_path_buf();
    config.storage.captions_dir = captions.path().to_path_buf();
    configure(&mut config);

    let backend = StubBackend::new(behavior);
    let state = AppState::new(
        config,
        backend.clone(),
        Arc::new(StubProber),
        Arc::new(SilentVideoExtractor),
    )
    .unwrap();

    TestApp {
        router: create_router(state),
        backend,
        _videos: videos,
        captions,
    }
}

fn create_test_app() -> TestApp {
    create_test_app_with(Behavior::Caption, |_| {})
}

async fn send(app: &TestApp, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn given_running_server_when_root_requested_then_returns_banner() {
    let app = create_test_app();

    let (status, body) = send(&app, "GET", "/", Body::empty()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn given_healthy_backend_when_health_check_then_reports_default_model_service() {
    let app = create_test_app();

    let (status, body) = send(&app, "GET", "/health", Body::empty()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend_healthy"], true);
    assert_eq!(body["model_service_url"], "http://localhost:8000");
}

#[tokio::test]
async fn given_registry_when_listing_models_then_returns_all_keys_and_default() {
    let app = create_test_app();

    let (status, body) = send(&app, "GET", "/api/videos/available-models", Body::empty()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["default"], "qwen2vl");
    let models = body["models"].as_object().unwrap();
    assert_eq!(models.len(), 3);
    assert_eq!(models["omnivinci"]["protocol"], "video_inference");
    assert_eq!(models["qwen3omni"]["requires_audio"], true);
}

#[tokio::test]
async fn given_video_directory_when_listing_videos_then_only_videos_are_returned() {
    let app = create_test_app();

    let (status, body) = send(&app, "GET", "/api/videos", Body::empty()).await;

    assert_eq!(status, StatusCode::OK);
    let videos = body.as_array().unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0]["filename"], "clip.mp4");
    assert_eq!(videos[0]["has_caption"], false);
    assert_eq!(videos[0]["duration"], 30.0);
}

#[tokio::test]
async fn given_uncaptioned_video_when_caption_requested_then_generates_once_and_caches() {
    let app = create_test_app();

    let (status, first) = send(&app, "POST", "/api/videos/clip.mp4/caption", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["caption"], "Caption of clip.mp4 by qwen2vl");
    assert_eq!(first["model_name"], "qwen2vl");
    assert_eq!(first["model_version"], "Qwen/Qwen2-VL-7B-Instruct");
    assert!(!first["prompt"].as_str().unwrap().is_empty());

    let (status, second) = send(&app, "POST", "/api/videos/clip.mp4/caption", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, first);
    assert_eq!(app.backend.calls(), 1);

    let (status, fetched) = send(&app, "GET", "/api/videos/clip.mp4/caption", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, first);

    let (_, info) = send(&app, "GET", "/api/videos/clip.mp4", Body::empty()).await;
    assert_eq!(info["has_caption"], true);
    assert_eq!(info["model_used"], "qwen2vl");
}

#[tokio::test]
async fn given_cached_caption_when_regenerate_requested_then_backend_called_again() {
    let app = create_test_app();

    send(&app, "POST", "/api/videos/clip.mp4/caption", Body::empty()).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/videos/clip.mp4/caption?regenerate=true&model=omnivinci",
        Body::from(r#"{"prompt": "What is cooked?"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prompt"], "What is cooked?");
    assert_eq!(body["model_name"], "omnivinci");
    assert_eq!(app.backend.calls(), 2);

    let (_, all) = send(&app, "GET", "/api/videos/clip.mp4/all-captions", Body::empty()).await;
    assert_eq!(all["count"], 2);
    assert_eq!(all["captions"][0]["model_key"], "qwen2vl");
    assert_eq!(all["captions"][1]["model_display_name"], "OmniVinci");
}

#[tokio::test]
async fn given_missing_video_when_caption_requested_then_not_found() {
    let app = create_test_app();

    let (status, body) = send(&app, "POST", "/api/videos/missing.mp4/caption", Body::empty()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Video not found");
    assert_eq!(app.backend.calls(), 0);
}

#[tokio::test]
async fn given_unknown_model_when_caption_requested_then_bad_request() {
    let app = create_test_app();

    let (status, body) = send(&app, "POST", "/api/videos/clip.mp4/caption?model=llava", Body::empty()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("llava"));
}

#[tokio::test]
async fn given_traversal_filename_when_video_requested_then_bad_request() {
    let app = create_test_app();

    let (status, _) = send(&app, "GET", "/api/videos/..%2Fsecret.mp4", Body::empty()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn given_oversized_video_when_caption_requested_then_payload_too_large() {
    let app = create_test_app_with(Behavior::Caption, |config| {
        config.limits.max_video_size_mb = 0;
    });

    let (status, body) = send(&app, "POST", "/api/videos/clip.mp4/caption", Body::empty()).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["detail"].as_str().unwrap().starts_with("Video size"));
    assert_eq!(app.backend.calls(), 0);
}

#[tokio::test]
async fn given_slow_backend_when_caption_requested_then_gateway_timeout() {
    let app = create_test_app_with(Behavior::Timeout, |_| {});

    let (status, _) = send(&app, "POST", "/api/videos/clip.mp4/caption", Body::empty()).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    let (status, _) = send(&app, "GET", "/api/videos/clip.mp4/caption", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn given_silent_video_when_audio_model_requested_then_bad_request() {
    let app = create_test_app();

    let (status, body) = send(&app, "POST", "/api/videos/clip.mp4/caption?model=qwen3omni", Body::empty()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("qwen3omni"));
    assert_eq!(app.backend.calls(), 0);
}

#[tokio::test]
async fn given_invalid_json_body_when_caption_requested_then_bad_request() {
    let app = create_test_app();

    let (status, _) = send(&app, "POST", "/api/videos/clip.mp4/caption", Body::from("{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn given_cached_caption_when_deleted_then_second_delete_is_not_found() {
    let app = create_test_app();
    send(&app, "POST", "/api/videos/clip.mp4/caption", Body::empty()).await;

    let (status, body) = send(&app, "DELETE", "/api/videos/clip.mp4/caption?model=qwen2vl", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "clip.mp4");

    let (status, _) = send(&app, "DELETE", "/api/videos/clip.mp4/caption", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn given_video_when_streamed_then_returns_bytes_with_content_type() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/videos/clip.mp4/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "video/mp4");
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"not really a video");
}

#[tokio::test]
async fn given_request_id_header_when_requested_then_it_is_echoed() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn given_client_disconnect_when_caption_in_flight_then_caption_is_still_cached() {
    let app = create_test_app_with(Behavior::Slow(Duration::from_millis(800)), |_| {});
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(
            b"POST /api/videos/clip.mp4/caption?model=qwen2vl HTTP/1.1\r\n\
              Host: localhost\r\n\
              Content-Length: 0\r\n\r\n",
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(client);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let cached = app.captions.path().join("clip.mp4_qwen2vl.json");
    assert!(cached.is_file(), "caption should be cached after the client left");
    assert_eq!(app.backend.calls(), 1);

    let (status, body) = send(&app, "GET", "/api/videos/clip.mp4/caption", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["caption"], "Caption of clip.mp4 by qwen2vl");
}
