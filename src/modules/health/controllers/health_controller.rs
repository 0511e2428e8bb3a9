use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::modules::insights::InsightState;

/// Health check response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Readiness probe response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessChecks {
    pub credential_mode: String,
    pub credentials: bool,
    pub origins: bool,
    pub rate_limiting: bool,
}

/// GET /health - Liveness probe
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /ready - Readiness probe
/// Returns 503 while the configuration cannot serve insight requests
pub async fn readiness_check(state: web::Data<InsightState>) -> impl Responder {
    let checks = ReadinessChecks {
        credential_mode: state.credentials.mode().name().to_string(),
        credentials: state.credentials.check_configuration().is_ok(),
        origins: state.origin_policy.is_configured(),
        rate_limiting: state.limiter.is_enabled(),
    };
    let ready = checks.credentials && checks.origins;

    if !ready {
        tracing::warn!(
            credentials = checks.credentials,
            origins = checks.origins,
            "Readiness check failed"
        );
    }

    let response = ReadinessResponse { ready, checks };
    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

/// Configure health check routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check));
}
