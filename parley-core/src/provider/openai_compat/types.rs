//! Serde types for the OpenAI-compatible Chat Completions wire format.

use serde::{Deserialize, Serialize};

/// A single message in the API request body.
#[derive(Debug, Serialize)]
pub(super) struct ApiMessage<'a> {
    /// Message role ("user" or "assistant").
    pub(super) role: &'static str,
    /// Message content.
    pub(super) content: &'a str,
}

/// Request body for a Chat Completions API call.
#[derive(Debug, Serialize)]
pub(super) struct ApiRequest<'a> {
    /// Model identifier.
    pub(super) model: &'a str,
    /// Conversation messages.
    pub(super) messages: Vec<ApiMessage<'a>>,
}

/// Response body from a Chat Completions API call.
#[derive(Debug, Deserialize)]
pub(super) struct ApiResponse {
    pub(super) choices: Vec<Choice>,
}

/// A choice in the completion response.
#[derive(Debug, Deserialize)]
pub(super) struct Choice {
    pub(super) message: ChoiceMessage,
}

/// Message content in a completion choice.
#[derive(Debug, Deserialize)]
pub(super) struct ChoiceMessage {
    #[serde(default)]
    pub(super) content: Option<String>,
}

/// Error response body from the API.
#[derive(Debug, Deserialize)]
pub(super) struct ApiError {
    pub(super) error: ErrorDetail,
}

/// Detail inside an API error response.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorDetail {
    pub(super) message: String,
}
