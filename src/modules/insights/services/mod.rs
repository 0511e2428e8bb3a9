pub mod gemini;
pub mod upstream;
pub mod validator;

pub use gemini::{GeminiClient, LinearBackoff, UpstreamRetryStrategy};
pub use upstream::InsightUpstream;
pub use validator::{
    validate_body, validate_envelope, validate_prompt, validate_request, MAX_BODY_BYTES,
    MAX_PROMPT_CHARS,
};
