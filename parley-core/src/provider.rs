//! Completion service abstraction layer.
//!
//! Defines the [`LlmProvider`] trait that completion backends implement, and
//! the [`ProviderError`] taxonomy the completion client classifies.

mod mock;
mod openai_compat;

pub use mock::MockProvider;
pub use openai_compat::OpenAiCompatProvider;

use async_trait::async_trait;

use crate::message::Message;

/// Error type for provider operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// The service rejected the credentials (HTTP 401).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The service is throttling requests (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code returned by the service.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Connection, DNS, TLS or timeout failure before a response arrived.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// A success status whose body lacks the expected completion content.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Everything needed for one completion call.
#[derive(Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Bearer token for the service.
    pub api_key: &'a str,
    /// Model identifier.
    pub model: &'a str,
    /// History followed by the new user message, oldest first.
    pub messages: &'a [Message],
}

impl std::fmt::Debug for CompletionRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("messages", &self.messages.len())
            .finish()
    }
}

/// Trait for completion backends.
///
/// Implementations must be thread-safe (`Send + Sync`) for use
/// in async contexts.
///
/// # Examples
///
/// ```
/// use parley_core::message::Message;
/// use parley_core::provider::{CompletionRequest, LlmProvider, MockProvider};
///
/// # async fn example() {
/// let provider = MockProvider::new().with_response("Hi!");
/// let messages = vec![Message::user("Hello")];
/// let request = CompletionRequest {
///     api_key: "key",
///     model: "model",
///     messages: &messages,
/// };
///
/// assert_eq!(provider.complete(request).await.unwrap(), "Hi!");
/// # }
/// ```
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send the conversation and return the assistant's reply text.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ProviderError>;
}
