//! vidcap - video caption service
//!
//! Captions local video files with remote multimodal inference backends
//! (OpenAI-style chat completions or a bespoke video inference endpoint),
//! caching one JSON record per (video, model) on disk.

pub mod api;
pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod orchestrator;
pub mod registry;
pub mod videos;
