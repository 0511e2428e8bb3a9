use actix_web::{error::ResponseError, http::header, http::StatusCode, HttpResponse};

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Message returned to callers for any server-side failure
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate insight";

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Service misconfiguration. The detail is logged, never returned.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Declared origin is not in the allowed set
    #[error("Origin not allowed")]
    OriginDenied,

    /// No credential was presented
    #[error("Unauthorized: {0}")]
    AuthRequired(String),

    /// A credential was presented but rejected
    #[error("Unauthorized: {0}")]
    AuthInvalid(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Content-Type must be application/json")]
    UnsupportedContentType,

    /// Malformed or empty prompt payload
    #[error("{0}")]
    Validation(String),

    #[error("Prompt exceeds {max} characters")]
    PromptTooLong { max: usize },

    /// Client exhausted its window; carries the wait in seconds
    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    /// Timeouts and 5xx responses that outlived every retry
    #[error("Upstream transient error: {0}")]
    UpstreamTransient(String),

    /// Upstream failures that are not worth retrying
    #[error("Upstream error: {0}")]
    UpstreamFatal(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        let mut builder = HttpResponse::build(status_code);
        if let AppError::RateLimited { retry_after_secs } = self {
            builder.insert_header((header::RETRY_AFTER, retry_after_secs.to_string()));
        }

        builder.json(serde_json::json!({
            "error": {
                "message": self.client_message(),
                "code": status_code.as_u16(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::OriginDenied => StatusCode::FORBIDDEN,
            AppError::AuthRequired(_) | AppError::AuthInvalid(_) => StatusCode::UNAUTHORIZED,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::UnsupportedContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PromptTooLong { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamTransient(_) | AppError::UpstreamFatal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl AppError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn auth_required(msg: impl Into<String>) -> Self {
        AppError::AuthRequired(msg.into())
    }

    pub fn auth_invalid(msg: impl Into<String>) -> Self {
        AppError::AuthInvalid(msg.into())
    }

    /// Text safe to show the caller.
    ///
    /// Configuration and upstream failures collapse into fixed messages so
    /// neither internals nor upstream responses leak out.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Configuration(_) => "Service is not configured correctly".to_string(),
            AppError::UpstreamTransient(_) | AppError::UpstreamFatal(_) => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }

    /// Upstream failures worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::UpstreamTransient(_))
    }
}
