mod captions;
mod health;
mod models;
mod videos;

pub use captions::{
    all_captions_handler, delete_caption_handler, generate_caption_handler, get_caption_handler,
};
pub use health::{health_handler, root_handler};
pub use models::available_models_handler;
pub use videos::{list_videos_handler, stream_video_handler, video_info_handler};
