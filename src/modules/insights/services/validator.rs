use actix_web::http::{
    header::{self, HeaderMap},
    Method,
};

use crate::core::{AppError, Result};
use crate::modules::insights::models::InsightRequest;

/// Longest prompt accepted, in characters
pub const MAX_PROMPT_CHARS: usize = 4000;

/// Largest request body read from the wire
pub const MAX_BODY_BYTES: usize = 256 * 1024;

/// Runs the request checks in order and returns the trimmed prompt.
///
/// Method, then content type, then body shape, then emptiness, then length.
pub fn validate_request(method: &Method, headers: &HeaderMap, body: &[u8]) -> Result<String> {
    validate_envelope(method, headers)?;
    validate_body(body)
}

/// Method and content type; needs no body
pub fn validate_envelope(method: &Method, headers: &HeaderMap) -> Result<()> {
    if *method != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    if !is_json_content_type(headers) {
        return Err(AppError::UnsupportedContentType);
    }

    Ok(())
}

/// Parses the JSON body and checks the prompt
pub fn validate_body(body: &[u8]) -> Result<String> {
    let request: InsightRequest = serde_json::from_slice(body)
        .map_err(|_| AppError::validation("Request body must include a string 'prompt'"))?;

    validate_prompt(&request.prompt)
}

/// Checks emptiness and length of a prompt
pub fn validate_prompt(prompt: &str) -> Result<String> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Prompt must not be empty"));
    }

    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(AppError::PromptTooLong {
            max: MAX_PROMPT_CHARS,
        });
    }

    Ok(trimmed.to_string())
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}
