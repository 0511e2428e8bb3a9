//! Insight Proxy
//!
//! Forwards prompt-generation requests from the browser to a generative-language
//! API, enforcing CORS, credentials, per-client rate limits and a bounded
//! retry policy on the way.

pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

// Re-export commonly used types
pub use modules::health;
pub use modules::insights;
