//! Provider for OpenAI-compatible Chat Completions APIs (Groq, OpenAI, local
//! servers speaking the same wire format).

mod types;

#[cfg(test)]
mod tests;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use self::types::{ApiError, ApiMessage, ApiRequest, ApiResponse};
use super::{CompletionRequest, LlmProvider, ProviderError};
use crate::message::Message;

/// Provider for an OpenAI-compatible chat completions endpoint.
///
/// Holds the HTTP client and endpoint only; credentials and model arrive with
/// each [`CompletionRequest`] so a missing key is detected per call.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiCompatProvider {
    /// Create a provider that posts to `endpoint` and gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RequestFailed`] if the HTTP client cannot be
    /// built (e.g. no TLS backend available).
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Create a provider around a preconfigured HTTP client.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// The URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ProviderError> {
        let body = ApiRequest {
            model: request.model,
            messages: build_api_messages(request.messages),
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            messages = body.messages.len(),
            "openai_compat: POST complete request"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", request.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(describe_transport_error(&e)))?;

        let status = response.status();
        tracing::debug!(
            status = status.as_u16(),
            "openai_compat: complete response status"
        );

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::RequestFailed(describe_transport_error(&e)))?;

        classify_response(status, &text)
    }
}

/// Convert a slice of [`Message`]s to the wire format.
fn build_api_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
    messages
        .iter()
        .map(|m| ApiMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect()
}

/// Map a status code and body onto the reply text or a [`ProviderError`].
fn classify_response(status: StatusCode, body: &str) -> Result<String, ProviderError> {
    match status {
        StatusCode::OK => parse_completion(body),
        StatusCode::UNAUTHORIZED => Err(ProviderError::Authentication(
            api_error_message(body).unwrap_or_else(|| "Invalid API key".to_string()),
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited(
            api_error_message(body).unwrap_or_else(|| "Rate limit exceeded".to_string()),
        )),
        other => Err(ProviderError::Http {
            status: other.as_u16(),
            body: body.to_string(),
        }),
    }
}

/// Extract `choices[0].message.content` from a success body.
fn parse_completion(body: &str) -> Result<String, ProviderError> {
    let api_response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse response: {}", e)))?;

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".to_string()))?;

    choice
        .message
        .content
        .ok_or_else(|| ProviderError::InvalidResponse("choice has no message content".to_string()))
}

fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiError>(body)
        .ok()
        .map(|e| e.error.message)
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else {
        e.to_string()
    }
}
