use actix_web::http::header::{self, HeaderMap, HeaderValue};

use crate::core::{AppError, Result};

pub const ALLOWED_METHODS: &str = "POST, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-Api-Key";
pub const MAX_AGE_SECS: &str = "86400";

/// One entry of the allowed-origin set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPattern {
    /// `*`
    Any,
    /// Full origin such as `https://app.example.com`
    Exact(String),
    /// `*.example.com`, stored as the lowercase suffix `example.com`
    Suffix(String),
}

impl OriginPattern {
    pub fn parse(entry: &str) -> Self {
        if entry == "*" {
            OriginPattern::Any
        } else if let Some(suffix) = entry.strip_prefix("*.") {
            OriginPattern::Suffix(suffix.to_ascii_lowercase())
        } else {
            OriginPattern::Exact(entry.to_string())
        }
    }

    /// Returns the value to echo in `Access-Control-Allow-Origin` on a match
    fn matches(&self, origin: &str) -> Option<String> {
        match self {
            OriginPattern::Any => Some("*".to_string()),
            OriginPattern::Exact(exact) if exact == origin => Some(origin.to_string()),
            OriginPattern::Exact(_) => None,
            OriginPattern::Suffix(suffix) => {
                let host = origin_hostname(origin)?;
                let is_match = host == *suffix
                    || (host.len() > suffix.len()
                        && host.ends_with(suffix.as_str())
                        && host.as_bytes()[host.len() - suffix.len() - 1] == b'.');
                is_match.then(|| origin.to_string())
            }
        }
    }
}

fn origin_hostname(origin: &str) -> Option<String> {
    url::Url::parse(origin)
        .ok()?
        .host_str()
        .map(|h| h.to_ascii_lowercase())
}

/// Outcome of an allowed origin check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsDecision {
    /// Value for `Access-Control-Allow-Origin`; `None` for same-origin calls
    pub allow_origin: Option<String>,
}

impl CorsDecision {
    /// Writes the CORS headers onto a response.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(origin) = &self.allow_origin {
            if let Ok(value) = HeaderValue::from_str(origin) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
                headers.insert(header::VARY, HeaderValue::from_static("Origin"));
            }
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(MAX_AGE_SECS),
        );
    }
}

/// Decides which cross-origin callers may use the proxy.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    /// `None` when production runs without any configured origin
    patterns: Option<Vec<OriginPattern>>,
}

impl OriginPolicy {
    /// Builds the policy from `ALLOWED_ORIGINS` entries.
    ///
    /// An empty list means "allow everyone" outside production and
    /// "misconfigured" in production.
    pub fn new(entries: &[String], is_production: bool) -> Self {
        let patterns = if entries.is_empty() {
            if is_production {
                None
            } else {
                Some(vec![OriginPattern::Any])
            }
        } else {
            Some(entries.iter().map(|e| OriginPattern::parse(e)).collect())
        };

        Self { patterns }
    }

    pub fn is_configured(&self) -> bool {
        self.patterns.is_some()
    }

    /// Checks the declared `Origin` header against the allowed set.
    pub fn evaluate(&self, origin: Option<&str>) -> Result<CorsDecision> {
        let patterns = self.patterns.as_ref().ok_or_else(|| {
            AppError::configuration("ALLOWED_ORIGINS must be set in production")
        })?;

        let Some(origin) = origin else {
            return Ok(CorsDecision::default());
        };

        patterns
            .iter()
            .find_map(|p| p.matches(origin))
            .map(|echo| CorsDecision {
                allow_origin: Some(echo),
            })
            .ok_or(AppError::OriginDenied)
    }

    /// Same as [`evaluate`](Self::evaluate) on the raw header value.
    ///
    /// A present but non-ASCII `Origin` is denied, never treated as absent.
    pub fn evaluate_header(&self, origin: Option<&HeaderValue>) -> Result<CorsDecision> {
        match origin.map(HeaderValue::to_str) {
            None => self.evaluate(None),
            Some(Ok(origin)) => self.evaluate(Some(origin)),
            Some(Err(_)) if self.is_configured() => Err(AppError::OriginDenied),
            Some(Err(_)) => self.evaluate(None),
        }
    }
}
