//! Completion client: context assembly, service call, outcome classification
//! and persistence of the exchanged turn pair.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::history::UserId;
use crate::message::{Message, Role};
use crate::provider::{CompletionRequest, LlmProvider, OpenAiCompatProvider, ProviderError};
use crate::storage::{ChatStore, StorageError};


/// Result of one [`CompletionClient::get_response`] call.
///
/// Every variant renders (via [`fmt::Display`]) as a plain string ready to be
/// shown to the user; failures start with `"Error: "`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The service replied; the turn pair has been persisted.
    Success(String),
    /// Required settings are missing. No request was sent.
    ConfigurationError(String),
    /// The service rejected the credentials.
    AuthError(String),
    /// The service is throttling; the caller may retry later.
    RateLimited(String),
    /// Any other non-success status.
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },
    /// The service could not be reached (refused, DNS, timeout).
    NetworkError(String),
    /// Success status but the body did not contain a reply.
    InvalidResponse(String),
}

impl ChatOutcome {
    /// `true` only for [`ChatOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, ChatOutcome::Success(_))
    }

    /// Short machine-friendly label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatOutcome::Success(_) => "success",
            ChatOutcome::ConfigurationError(_) => "configuration_error",
            ChatOutcome::AuthError(_) => "auth_error",
            ChatOutcome::RateLimited(_) => "rate_limited",
            ChatOutcome::ApiError { .. } => "api_error",
            ChatOutcome::NetworkError(_) => "network_error",
            ChatOutcome::InvalidResponse(_) => "invalid_response",
        }
    }
}

impl fmt::Display for ChatOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatOutcome::Success(text) => f.write_str(text),
            ChatOutcome::ConfigurationError(detail) => write!(
                f,
                "Error: Completion service configuration not found: {}",
                detail
            ),
            ChatOutcome::AuthError(_) => f.write_str("Error: Invalid API key"),
            ChatOutcome::RateLimited(_) => {
                f.write_str("Error: Rate limit exceeded. Please try again later.")
            }
            ChatOutcome::ApiError { status, body } => write!(
                f,
                "Error: API request failed with status {}: {}",
                status, body
            ),
            ChatOutcome::NetworkError(detail) => write!(
                f,
                "Error: Failed to connect to completion service: {}",
                detail
            ),
            ChatOutcome::InvalidResponse(detail) => write!(
                f,
                "Error: Unexpected response from completion service: {}",
                detail
            ),
        }
    }
}

impl From<ProviderError> for ChatOutcome {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Authentication(detail) => ChatOutcome::AuthError(detail),
            ProviderError::RateLimited(detail) => ChatOutcome::RateLimited(detail),
            ProviderError::Http { status, body } => ChatOutcome::ApiError { status, body },
            ProviderError::RequestFailed(detail) => ChatOutcome::NetworkError(detail),
            ProviderError::InvalidResponse(detail) => ChatOutcome::InvalidResponse(detail),
        }
    }
}

/// Settings captured once at initialization and read on every call.
#[derive(Clone, PartialEq)]
pub struct CompletionSettings {
    /// Bearer token; `None` yields a configuration error per request.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Number of user/assistant pairs sent as context.
    pub history_pairs: u32,
}

impl CompletionSettings {
    /// Build settings from the loaded config, resolving the API key override.
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.resolve_api_key(),
            model: config.completion.model.clone(),
            history_pairs: config.completion.history_pairs,
        }
    }
}

impl fmt::Debug for CompletionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("history_pairs", &self.history_pairs)
            .finish()
    }
}

/// Builds context-aware requests and records successful exchanges.
pub struct CompletionClient {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn ChatStore>,
    settings: CompletionSettings,
}

impl CompletionClient {
    /// Create a client from its collaborators.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn ChatStore>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            provider,
            store,
            settings,
        }
    }

    /// Create a client talking to the configured OpenAI-compatible endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the HTTP client cannot be built.
    pub fn from_config(config: &Config, store: Arc<dyn ChatStore>) -> Result<Self, ProviderError> {
        let provider = OpenAiCompatProvider::new(
            config.completion.endpoint.clone(),
            Duration::from_secs(config.completion.timeout_secs),
        )?;
        Ok(Self::new(
            Arc::new(provider),
            store,
            CompletionSettings::from_config(config),
        ))
    }

    /// Settings in effect.
    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    /// Ask the completion service to answer `text` in the context of the
    /// user's recent history.
    ///
    /// The user and assistant turns are persisted only when the service
    /// returns a usable reply; every failure leaves the history untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if reading the history or persisting the turn
    /// pair fails. Service failures are reported through [`ChatOutcome`].
    pub async fn get_response(
        &self,
        user_id: UserId,
        text: &str,
    ) -> Result<ChatOutcome, StorageError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty());
        let Some(api_key) = api_key else {
            tracing::warn!(user_id, "completion: api_key is not configured");
            return Ok(ChatOutcome::ConfigurationError(
                "api_key is not set".to_string(),
            ));
        };
        if self.settings.model.trim().is_empty() {
            tracing::warn!(user_id, "completion: model is not configured");
            return Ok(ChatOutcome::ConfigurationError(
                "model is not set".to_string(),
            ));
        }

        let mut messages: Vec<Message> = self
            .store
            .recent_turns(user_id, self.settings.history_pairs)
            .await?
            .into_iter()
            .map(Message::from)
            .collect();
        messages.push(Message::user(text));

        tracing::debug!(
            user_id,
            context = messages.len() - 1,
            model = %self.settings.model,
            "completion: sending request"
        );

        let request = CompletionRequest {
            api_key,
            model: &self.settings.model,
            messages: &messages,
        };
        let reply = match self.provider.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "completion: request failed");
                return Ok(ChatOutcome::from(e));
            }
        };

        self.store.append_turn(user_id, Role::User, text).await?;
        self.store
            .append_turn(user_id, Role::Assistant, &reply)
            .await?;

        tracing::debug!(user_id, chars = reply.chars().count(), "completion: reply stored");
        Ok(ChatOutcome::Success(reply))
    }
}
