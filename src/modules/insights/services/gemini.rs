use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, Retryable, RetryableStrategy};
use retry_policies::{RetryDecision, RetryPolicy};
use tracing::{error, info, warn};

use super::upstream::InsightUpstream;
use crate::config::{RequestConfig, UpstreamConfig};
use crate::core::{ApiSecret, AppError, Result};
use crate::modules::insights::models::UpstreamPayload;

/// Gemini `generateContent` client
///
/// Each attempt is bounded by `timeout_ms`. Timeouts and 5xx responses are
/// retried up to `max_retries` times with a linearly growing delay.
pub struct GeminiClient {
    client: ClientWithMiddleware,
    endpoint: String,
    system_instruction: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request.timeout_ms))
            .build()
            .map_err(|e| {
                AppError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        let retry = RetryTransientMiddleware::new_with_policy_and_strategy(
            LinearBackoff::from(config.request),
            UpstreamRetryStrategy,
        );

        Ok(Self {
            client: ClientBuilder::new(http).with(retry).build(),
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            system_instruction: config.system_instruction.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl InsightUpstream for GeminiClient {
    async fn generate(&self, prompt: &str, api_key: &ApiSecret) -> Result<serde_json::Value> {
        let payload = UpstreamPayload::new(prompt, self.system_instruction.as_deref());
        let body = serde_json::to_vec(&payload)
            .map_err(|e| AppError::UpstreamFatal(format!("Failed to encode payload: {}", e)))?;

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key.expose())])
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            error!(%status, "Upstream kept failing after retries");
            return Err(AppError::UpstreamTransient(status.to_string()));
        }
        if !status.is_success() {
            error!(%status, "Upstream rejected request");
            return Err(AppError::UpstreamFatal(status.to_string()));
        }

        let json = response.json::<serde_json::Value>().await.map_err(|e| {
            AppError::UpstreamFatal(format!("Invalid upstream response: {}", e.without_url()))
        })?;

        info!(%status, "Upstream responded");
        Ok(json)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Maps a failed send to the error taxonomy.
///
/// The request URL carries the key as a query parameter, so it is stripped
/// from the error before the message is kept.
fn transport_error(err: reqwest_middleware::Error) -> AppError {
    match err {
        reqwest_middleware::Error::Reqwest(e) => {
            let e = e.without_url();
            if e.is_timeout() {
                error!(error = %e, "Upstream timed out after retries");
                AppError::UpstreamTransient(format!("timeout: {}", e))
            } else {
                error!(error = %e, "Upstream request failed");
                AppError::UpstreamFatal(e.to_string())
            }
        }
        reqwest_middleware::Error::Middleware(e) => {
            error!(error = %e, "Upstream middleware failed");
            AppError::UpstreamFatal(e.to_string())
        }
    }
}

/// Retries timeouts and 5xx responses; everything else is final
#[derive(Debug, Clone, Copy, Default)]
pub struct UpstreamRetryStrategy;

impl RetryableStrategy for UpstreamRetryStrategy {
    fn handle(
        &self,
        res: &std::result::Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(response) if response.status().is_success() => None,
            Ok(response) if response.status().is_server_error() => {
                warn!(status = %response.status(), "Upstream server error, will retry");
                Some(Retryable::Transient)
            }
            Ok(_) => Some(Retryable::Fatal),
            Err(reqwest_middleware::Error::Reqwest(e)) if e.is_timeout() => {
                warn!("Upstream attempt timed out, will retry");
                Some(Retryable::Transient)
            }
            Err(_) => Some(Retryable::Fatal),
        }
    }
}

/// Waits `base_delay × attempt` between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl LinearBackoff {
    /// Delay before retry number `n_past_retries + 1`
    pub fn delay(&self, n_past_retries: u32) -> Duration {
        self.base_delay * (n_past_retries + 1)
    }
}

impl From<RequestConfig> for LinearBackoff {
    fn from(config: RequestConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }
}

impl RetryPolicy for LinearBackoff {
    fn should_retry(&self, _request_start_time: SystemTime, n_past_retries: u32) -> RetryDecision {
        if n_past_retries >= self.max_retries {
            return RetryDecision::DoNotRetry;
        }

        RetryDecision::Retry {
            execute_after: SystemTime::now() + self.delay(n_past_retries),
        }
    }
}
