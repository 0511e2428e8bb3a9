use super::RequestConfig;

/// Listener settings for the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    /// Grace period on shutdown so in-flight upstream calls can finish
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// `workers` of `None` means one per available core. The shutdown grace
    /// period covers the slowest insight request `request` allows.
    pub fn new(host: String, port: u16, workers: Option<usize>, request: &RequestConfig) -> Self {
        let workers = workers.filter(|w| *w > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        Self {
            host,
            port,
            workers,
            shutdown_timeout_secs: worst_case_request_ms(request).div_ceil(1000),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Every attempt timing out, plus the linear backoff between attempts
fn worst_case_request_ms(request: &RequestConfig) -> u64 {
    let retries = u64::from(request.max_retries);
    let attempts_ms = request.timeout_ms.saturating_mul(retries + 1);
    let backoff_ms = request
        .retry_base_delay_ms
        .saturating_mul(retries * (retries + 1) / 2);
    attempts_ms.saturating_add(backoff_ms)
}
