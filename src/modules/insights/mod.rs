pub mod controllers;
pub mod models;
pub mod services;

pub use controllers::{configure, InsightState};
pub use models::UpstreamPayload;
pub use services::{GeminiClient, InsightUpstream, MAX_BODY_BYTES, MAX_PROMPT_CHARS};
