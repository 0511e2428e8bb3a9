use std::sync::Arc;

use actix_web::{
    http::{header, Method},
    web::{self, Bytes},
    HttpRequest, HttpResponse, ResponseError,
};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::{AppError, Result};
use crate::middleware::{
    ClientKey, CorsDecision, CredentialResolver, FixedWindowLimiter, OriginPolicy,
};
use crate::modules::insights::services::{
    validate_body, validate_envelope, GeminiClient, InsightUpstream, MAX_BODY_BYTES,
    MAX_PROMPT_CHARS,
};

/// Everything the insight endpoint needs, built once from [`Config`]
pub struct InsightState {
    pub origin_policy: OriginPolicy,
    pub credentials: CredentialResolver,
    pub limiter: FixedWindowLimiter,
    pub upstream: Arc<dyn InsightUpstream>,
}

impl InsightState {
    /// Production wiring: in-memory limiter on the wall clock, Gemini upstream
    pub fn from_config(config: &Config) -> Result<Self> {
        let upstream = Arc::new(GeminiClient::new(&config.upstream)?);
        Ok(Self::new(
            config,
            FixedWindowLimiter::new(config.rate_limit),
            upstream,
        ))
    }

    pub fn new(
        config: &Config,
        limiter: FixedWindowLimiter,
        upstream: Arc<dyn InsightUpstream>,
    ) -> Self {
        Self {
            origin_policy: OriginPolicy::new(
                &config.cors.allowed_origins,
                config.app.is_production(),
            ),
            credentials: CredentialResolver::new(config.credentials.clone()),
            limiter,
            upstream,
        }
    }
}

/// POST /api/insight (OPTIONS for preflight)
///
/// Always answers with JSON and the CORS headers the origin is entitled to,
/// including on errors. The body is only read once origin, credentials,
/// method and content type have passed.
pub async fn generate_insight(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<InsightState>,
) -> HttpResponse {
    let origin_check = state
        .origin_policy
        .evaluate_header(req.headers().get(header::ORIGIN));

    if req.method() == Method::OPTIONS {
        return match origin_check {
            Ok(cors) => preflight(&cors),
            // browser enforces the missing allow-origin header
            Err(AppError::OriginDenied) => preflight(&CorsDecision::default()),
            Err(err) => error_response(&err, &CorsDecision::default()),
        };
    }

    let cors = match origin_check {
        Ok(cors) => cors,
        Err(err) => {
            // An unusable credential setup outranks a foreign origin.
            let err = state.credentials.check_configuration().err().unwrap_or(err);
            return error_response(&err, &CorsDecision::default());
        }
    };

    match process(&req, payload, &state).await {
        Ok(json) => {
            let mut response = HttpResponse::Ok().json(json);
            cors.apply(response.headers_mut());
            response
        }
        Err(err) => error_response(&err, &cors),
    }
}

async fn process(
    req: &HttpRequest,
    payload: web::Payload,
    state: &InsightState,
) -> Result<serde_json::Value> {
    let credential = state.credentials.resolve(req.headers())?;
    validate_envelope(req.method(), req.headers())?;
    let body = read_body(payload).await?;
    let prompt = validate_body(&body)?;

    let forwarded_for = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok());
    let peer = req.peer_addr().map(|addr| addr.ip().to_string());
    let client = ClientKey::derive(
        credential.fingerprint.as_deref(),
        forwarded_for,
        peer.as_deref(),
    );

    state.limiter.enforce(&client)?;

    info!(
        client = %client,
        upstream = state.upstream.name(),
        prompt_chars = prompt.chars().count(),
        "Forwarding prompt upstream"
    );

    state.upstream.generate(&prompt, &credential.upstream_key).await
}

/// Reads at most [`MAX_BODY_BYTES`]; anything larger cannot hold a valid prompt.
async fn read_body(payload: web::Payload) -> Result<Bytes> {
    match payload.to_bytes_limited(MAX_BODY_BYTES).await {
        Ok(Ok(body)) => Ok(body),
        Ok(Err(err)) => Err(AppError::validation(format!(
            "Failed to read request body: {}",
            err
        ))),
        Err(_) => Err(AppError::PromptTooLong {
            max: MAX_PROMPT_CHARS,
        }),
    }
}

fn preflight(cors: &CorsDecision) -> HttpResponse {
    let mut response = HttpResponse::NoContent().finish();
    cors.apply(response.headers_mut());
    response
}

fn error_response(err: &AppError, cors: &CorsDecision) -> HttpResponse {
    let status = err.status_code();
    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "Insight request failed");
    } else {
        warn!(status = status.as_u16(), error = %err, "Insight request rejected");
    }

    let mut response = err.error_response();
    cors.apply(response.headers_mut());
    response
}

/// Configure insight routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/insight").to(generate_insight));
}
