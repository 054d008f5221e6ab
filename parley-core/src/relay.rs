//! Inbound message pipeline: access gate, completion, formatting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::completion::{CompletionClient, CompletionSettings};
use crate::config::Config;
use crate::format::ResponseFormatter;
use crate::gate::{AccessError, AccessGate};
use crate::history::UserId;
use crate::provider::LlmProvider;
use crate::storage::{ChatStore, StorageError};


/// A message as delivered by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Platform id of the author.
    pub author_id: UserId,
    /// Message text with any command prefix already removed.
    pub text: String,
    /// Authored by a bot account.
    pub is_bot_author: bool,
    /// Sent in a guild channel rather than a direct message.
    pub has_guild_context: bool,
}

impl InboundMessage {
    /// A direct message from a human user.
    pub fn direct(author_id: UserId, text: impl Into<String>) -> Self {
        Self {
            author_id,
            text: text.into(),
            is_bot_author: false,
            has_guild_context: false,
        }
    }
}

/// Wires the access gate, completion client and formatter together.
pub struct Relay {
    gate: AccessGate,
    completion: CompletionClient,
    formatter: ResponseFormatter,
    store: Arc<dyn ChatStore>,
    locks: Option<UserLocks>,
}

impl Relay {
    /// Build a relay from config and its two external collaborators.
    pub fn new(store: Arc<dyn ChatStore>, provider: Arc<dyn LlmProvider>, config: &Config) -> Self {
        let gate = AccessGate::new(store.clone(), config.admin_id);
        let completion = CompletionClient::new(
            provider,
            store.clone(),
            CompletionSettings::from_config(config),
        );
        let formatter = ResponseFormatter::from_config(&config.format);
        Self::from_parts(
            store,
            gate,
            completion,
            formatter,
            config.chat.serialize_per_user,
        )
    }

    /// Build a relay from already configured parts.
    pub fn from_parts(
        store: Arc<dyn ChatStore>,
        gate: AccessGate,
        completion: CompletionClient,
        formatter: ResponseFormatter,
        serialize_per_user: bool,
    ) -> Self {
        Self {
            gate,
            completion,
            formatter,
            store,
            locks: serialize_per_user.then(UserLocks::default),
        }
    }

    /// The access gate, for admin operations.
    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Process one inbound message.
    ///
    /// Returns `Ok(None)` when the message is dropped without a reply: bot
    /// authors, blank text, and authors who are not whitelisted. Otherwise
    /// returns the reply (or the error line) split into transport-sized
    /// chunks, in order.
    ///
    /// Messages from the same user are handled one at a time when per-user
    /// serialization is enabled; different users never wait on each other.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store fails; the caller decides what to
    /// show the user.
    pub async fn handle_message(
        &self,
        message: &InboundMessage,
    ) -> Result<Option<Vec<String>>, StorageError> {
        let user_id = message.author_id;
        if message.is_bot_author {
            return Ok(None);
        }
        let text = message.text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if !self.gate.check_access(user_id).await? {
            // Silent drop.
            tracing::debug!(user_id, "relay: ignoring message from non-whitelisted user");
            return Ok(None);
        }

        let _turn = match &self.locks {
            Some(locks) => Some(locks.acquire(user_id).await),
            None => None,
        };

        tracing::info!(
            user_id,
            guild = message.has_guild_context,
            chars = text.chars().count(),
            "relay: handling message"
        );
        let outcome = self.completion.get_response(user_id, text).await?;
        let chunks = self.formatter.format(&outcome.to_string());
        tracing::info!(
            user_id,
            outcome = outcome.kind(),
            chunks = chunks.len(),
            "relay: reply ready"
        );
        Ok(Some(chunks))
    }

    /// Let a whitelisted user erase their own history.
    ///
    /// Returns the number of deleted turns.
    ///
    /// # Errors
    ///
    /// [`AccessError::NotWhitelisted`] for non-members, [`AccessError::Storage`]
    /// on store failure.
    pub async fn clear_memory(&self, user_id: UserId) -> Result<u64, AccessError> {
        self.gate.require_member(user_id).await?;
        let _turn = match &self.locks {
            Some(locks) => Some(locks.acquire(user_id).await),
            None => None,
        };
        let cleared = self.store.clear_turns(user_id).await?;
        tracing::info!(user_id, cleared, "relay: history cleared by user");
        Ok(cleared)
    }

    #[cfg(test)]
    fn active_user_locks(&self) -> usize {
        self.locks.as_ref().map_or(0, |locks| locks.slots().len())
    }
}

/// Per-user async locks, created on demand and dropped once idle.
#[derive(Default)]
struct UserLocks {
    slots: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, user_id: UserId) -> UserTurn<'_> {
        let slot = {
            let mut slots = self.slots();
            slots.entry(user_id).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        UserTurn {
            locks: self,
            user_id,
            guard: Some(guard),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<UserId, Arc<AsyncMutex<()>>>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Holds a user's lock; removes the idle slot on drop.
struct UserTurn<'a> {
    locks: &'a UserLocks,
    user_id: UserId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserTurn<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.locks.slots();
        if let Some(slot) = slots.get(&self.user_id)
            && Arc::strong_count(slot) == 1
        {
            slots.remove(&self.user_id);
        }
    }
}
