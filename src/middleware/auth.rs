use actix_web::http::header::{self, HeaderMap};

use crate::config::CredentialMode;
use crate::core::{ApiSecret, AppError, Result};

/// Header carrying a caller-supplied upstream key
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Credential picked for one request
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    /// Key sent upstream
    pub upstream_key: ApiSecret,
    /// SHA-256 of whatever secret the caller presented, if any
    pub fingerprint: Option<String>,
}

/// Resolves the upstream key and authorizes the caller.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    mode: CredentialMode,
}

impl CredentialResolver {
    pub fn new(mode: CredentialMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> &CredentialMode {
        &self.mode
    }

    /// Fails when the configured mode cannot serve any request
    pub fn check_configuration(&self) -> Result<()> {
        match self.mode.misconfiguration() {
            Some(reason) => Err(AppError::configuration(reason)),
            None => Ok(()),
        }
    }

    pub fn resolve(&self, headers: &HeaderMap) -> Result<ResolvedCredential> {
        self.check_configuration()?;

        match &self.mode {
            CredentialMode::ServerHeld {
                api_key,
                access_tokens,
                require_access_token,
            } => {
                let upstream_key = api_key
                    .clone()
                    .ok_or_else(|| AppError::configuration("GEMINI_API_KEY not set"))?;

                if access_tokens.is_empty() && !require_access_token {
                    return Ok(ResolvedCredential {
                        upstream_key,
                        fingerprint: None,
                    });
                }

                let token = bearer_token(headers)
                    .map(ApiSecret::new)
                    .ok_or_else(|| AppError::auth_required("Missing access token"))?;

                if !access_tokens.contains(&token) {
                    return Err(AppError::auth_invalid("Invalid access token"));
                }

                Ok(ResolvedCredential {
                    upstream_key,
                    fingerprint: Some(token.fingerprint()),
                })
            }
            CredentialMode::ClientSupplied => {
                let key = header_value(headers, API_KEY_HEADER)
                    .or_else(|| bearer_token(headers))
                    .map(ApiSecret::new)
                    .ok_or_else(|| AppError::auth_required("Missing API key"))?;

                let fingerprint = key.fingerprint();
                Ok(ResolvedCredential {
                    upstream_key: key,
                    fingerprint: Some(fingerprint),
                })
            }
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Token from `Authorization: Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = header_value(headers, header::AUTHORIZATION.as_str())?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
