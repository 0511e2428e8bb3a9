use serde::{Deserialize, Serialize};

/// Body accepted on `POST /api/insight`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRequest {
    pub prompt: String,
}

/// `generateContent` request body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamPayload {
    pub contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub text: String,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part { text: text.into() }],
        }
    }
}

impl UpstreamPayload {
    /// Wraps a prompt in a single content block
    pub fn new(prompt: &str, system_instruction: Option<&str>) -> Self {
        Self {
            contents: vec![Content::text(prompt)],
            system_instruction: system_instruction.map(Content::text),
        }
    }
}
