use async_trait::async_trait;

use crate::core::{ApiSecret, Result};

/// Generative-content provider the proxy forwards prompts to
#[async_trait]
pub trait InsightUpstream: Send + Sync {
    /// Send a validated prompt and return the provider's JSON verbatim.
    ///
    /// Errors are `UpstreamTransient` once retries are exhausted and
    /// `UpstreamFatal` for failures that were never retried.
    async fn generate(&self, prompt: &str, api_key: &ApiSecret) -> Result<serde_json::Value>;

    /// Provider name for logs
    fn name(&self) -> &str;
}
