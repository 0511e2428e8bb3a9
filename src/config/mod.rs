use crate::core::{ApiSecret, AppError, Result};
use std::env;
use std::str::FromStr;

pub mod server;

pub use server::ServerConfig;

/// Upper bound on `MAX_RETRIES`
pub const MAX_RETRIES_CAP: u32 = 3;

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_UPSTREAM_MODEL: &str = "gemini-1.5-flash";

/// Main application configuration.
///
/// Resolved once at startup and shared read-only by every request.
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub credentials: CredentialMode,
    pub rate_limit: RateLimitConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Raw entries from `ALLOWED_ORIGINS`, trimmed, empties dropped
    pub allowed_origins: Vec<String>,
}

/// Where the upstream key comes from.
#[derive(Debug, Clone)]
pub enum CredentialMode {
    /// The key lives in server configuration; callers may be gated by
    /// static bearer tokens.
    ServerHeld {
        api_key: Option<ApiSecret>,
        access_tokens: Vec<ApiSecret>,
        require_access_token: bool,
    },
    /// Every caller brings their own key.
    ClientSupplied,
}

impl CredentialMode {
    pub fn name(&self) -> &'static str {
        match self {
            CredentialMode::ServerHeld { .. } => "server",
            CredentialMode::ClientSupplied => "client",
        }
    }

    /// Describes why this mode cannot serve requests, if it cannot.
    pub fn misconfiguration(&self) -> Option<&'static str> {
        match self {
            CredentialMode::ServerHeld { api_key: None, .. } => Some("GEMINI_API_KEY not set"),
            CredentialMode::ServerHeld {
                access_tokens,
                require_access_token: true,
                ..
            } if access_tokens.is_empty() => {
                Some("REQUIRE_ACCESS_TOKEN is set but ACCESS_TOKENS is empty")
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests per window; zero or negative disables limiting
    pub max_requests: i64,
    pub window_ms: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window_ms: 60_000,
        }
    }
}

/// Timeout and retry budget for upstream calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            max_retries: 2,
            retry_base_delay_ms: 250,
        }
    }
}

impl RequestConfig {
    /// Builds a config, capping retries at [`MAX_RETRIES_CAP`]
    pub fn new(timeout_ms: u64, max_retries: u32, retry_base_delay_ms: u64) -> Self {
        Self {
            timeout_ms,
            max_retries: max_retries.min(MAX_RETRIES_CAP),
            retry_base_delay_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub model: String,
    pub system_instruction: Option<String>,
    pub request: RequestConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            model: DEFAULT_UPSTREAM_MODEL.to_string(),
            system_instruction: None,
            request: RequestConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let credentials = match get("CREDENTIAL_MODE")
            .unwrap_or_else(|| "server".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "server" => CredentialMode::ServerHeld {
                api_key: get("GEMINI_API_KEY").map(ApiSecret::new),
                access_tokens: split_list(get("ACCESS_TOKENS").as_deref())
                    .into_iter()
                    .map(ApiSecret::new)
                    .collect(),
                require_access_token: parse_or(&get, "REQUIRE_ACCESS_TOKEN", false)?,
            },
            "client" => CredentialMode::ClientSupplied,
            other => {
                return Err(AppError::configuration(format!(
                    "Invalid CREDENTIAL_MODE '{}', expected 'server' or 'client'",
                    other
                )))
            }
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let request = RequestConfig::new(
            parse_or(&get, "REQUEST_TIMEOUT_MS", 15_000)?,
            parse_or(&get, "MAX_RETRIES", 2)?,
            parse_or(&get, "RETRY_BASE_DELAY_MS", 250)?,
        );
        // 0 or unset: one worker per core
        let workers = Some(parse_or(&get, "SERVER_WORKERS", 0usize)?);

        let config = Config {
            app: AppConfig {
                env: get("APP_ENV").unwrap_or_else(|| "development".to_string()),
                log_format,
            },
            server: ServerConfig::new(
                get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
                parse_or(&get, "SERVER_PORT", 8080)?,
                workers,
                &request,
            ),
            cors: CorsConfig {
                allowed_origins: split_list(get("ALLOWED_ORIGINS").as_deref()),
            },
            credentials,
            rate_limit: RateLimitConfig {
                max_requests: parse_or(&get, "RATE_LIMIT_MAX_REQUESTS", 20)?,
                window_ms: parse_or(&get, "RATE_LIMIT_WINDOW_MS", 60_000)?,
            },
            upstream: UpstreamConfig {
                base_url: get("UPSTREAM_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string()),
                model: get("UPSTREAM_MODEL").unwrap_or_else(|| DEFAULT_UPSTREAM_MODEL.to_string()),
                system_instruction: get("UPSTREAM_SYSTEM_INSTRUCTION"),
                request,
            },
        };

        Ok(config)
    }

    /// Validate configuration
    ///
    /// Only structural problems fail here. Missing secrets and an empty origin
    /// list in production are reported per request so the service can answer
    /// with a proper error body.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.window_ms <= 0 {
            return Err(AppError::configuration(
                "RATE_LIMIT_WINDOW_MS must be greater than 0",
            ));
        }

        if self.upstream.request.timeout_ms == 0 {
            return Err(AppError::configuration(
                "REQUEST_TIMEOUT_MS must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::configuration(format!("Invalid {}", key))),
        None => Ok(default),
    }
}

/// Splits a comma-separated list, trimming entries and dropping empties
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}
