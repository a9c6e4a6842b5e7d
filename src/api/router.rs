use axum::Router;
use axum::middleware;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::api::handlers::{
    all_captions_handler, available_models_handler, delete_caption_handler,
    generate_caption_handler, get_caption_handler, health_handler, list_videos_handler,
    root_handler, stream_video_handler, video_info_handler,
};
use crate::api::request_id::request_id_middleware;
use crate::api::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/videos", get(list_videos_handler))
        .route("/api/videos/available-models", get(available_models_handler))
        .route("/api/videos/{filename}", get(video_info_handler))
        .route("/api/videos/{filename}/stream", get(stream_video_handler))
        .route(
            "/api/videos/{filename}/caption",
            get(get_caption_handler)
                .post(generate_caption_handler)
                .delete(delete_caption_handler),
        )
        .route("/api/videos/{filename}/all-captions", get(all_captions_handler))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
