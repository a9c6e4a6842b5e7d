//! HTTP surface over the caption orchestrator.

pub mod error;
pub mod handlers;
pub mod request_id;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;
