//! Mock completion provider for testing.
//!
//! Provides [`MockProvider`], a scripted implementation of [`LlmProvider`]
//! that also records every request it receives.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{CompletionRequest, LlmProvider, ProviderError};
use crate::message::Message;

/// A scripted provider for tests.
///
/// Replies are returned in FIFO order. When the script is exhausted the
/// provider answers `"Mock response"`.
///
/// # Examples
///
/// ```
/// use parley_core::message::Message;
/// use parley_core::provider::{CompletionRequest, LlmProvider, MockProvider, ProviderError};
///
/// # async fn example() {
/// let provider = MockProvider::new()
///     .with_response("First")
///     .with_error(ProviderError::RateLimited("slow down".into()));
/// let messages = vec![Message::user("Hi")];
/// let request = CompletionRequest { api_key: "k", model: "m", messages: &messages };
///
/// assert_eq!(provider.complete(request).await.unwrap(), "First");
/// assert!(provider.complete(request).await.is_err());
/// assert_eq!(provider.call_count(), 2);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    #[must_use]
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.push(Ok(content.into()));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_error(self, error: ProviderError) -> Self {
        self.push(Err(error));
        self
    }

    /// Number of times `complete` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Message lists received so far, one entry per call.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, outcome: Result<String, ProviderError>) {
        // Poisoning only happens after a panic in another test thread.
        match self.script.lock() {
            Ok(mut script) => script.push_back(outcome),
            Err(poisoned) => poisoned.into_inner().push_back(outcome),
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.messages.to_vec()),
            Err(poisoned) => poisoned.into_inner().push(request.messages.to_vec()),
        }

        let next = match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or_else(|| Ok("Mock response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(messages: &[Message]) -> CompletionRequest<'_> {
        CompletionRequest {
            api_key: "key",
            model: "model",
            messages,
        }
    }

    #[tokio::test]
    async fn test_mock_provider_default_response() {
        let provider = MockProvider::new();
        let messages = vec![Message::user("Hello")];

        let response = provider.complete(request(&messages)).await.unwrap();
        assert_eq!(response, "Mock response");
    }

    #[tokio::test]
    async fn test_mock_provider_fifo_script() {
        let provider = MockProvider::new()
            .with_response("First")
            .with_error(ProviderError::Authentication("nope".to_string()))
            .with_response("Third");
        let messages = vec![Message::user("Hello")];

        assert_eq!(provider.complete(request(&messages)).await.unwrap(), "First");
        assert!(matches!(
            provider.complete(request(&messages)).await,
            Err(ProviderError::Authentication(_))
        ));
        assert_eq!(provider.complete(request(&messages)).await.unwrap(), "Third");
        assert_eq!(
            provider.complete(request(&messages)).await.unwrap(),
            "Mock response"
        );
    }

    #[tokio::test]
    async fn test_mock_provider_records_requests() {
        let provider = MockProvider::new();
        assert_eq!(provider.call_count(), 0);

        let messages = vec![Message::user("a"), Message::assistant("b")];
        provider.complete(request(&messages)).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.requests(), vec![messages]);
    }

    #[tokio::test]
    async fn test_llmprovider_is_object_safe() {
        let provider: Box<dyn LlmProvider> = Box::new(MockProvider::new());
        let messages = vec![Message::user("Test")];
        assert!(provider.complete(request(&messages)).await.is_ok());
    }
}
