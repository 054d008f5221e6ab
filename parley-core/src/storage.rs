//! Storage abstraction for conversation history and the chat whitelist.
//!
//! Provides the [`ChatStore`] trait as a port for storage implementations,
//! along with error types and the SQLite adapter.

pub mod sqlite;

pub use sqlite::{SqliteStore, create_storage};

use async_trait::async_trait;
use thiserror::Error;

use crate::history::{ConversationTurn, UserId, WhitelistEntry};
use crate::message::Role;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// A migration operation failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// Invalid data was encountered.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Port for history and whitelist storage.
///
/// Every operation is a single independent write or read; no transaction
/// spans two calls.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Returns `true` iff a whitelist entry exists for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the query fails.
    async fn is_whitelisted(&self, user_id: UserId) -> Result<bool, StorageError>;

    /// Add an entry to the whitelist.
    ///
    /// Returns `Ok(false)` if the user was already whitelisted; the existing
    /// entry is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the insert fails.
    async fn add_to_whitelist(&self, entry: &WhitelistEntry) -> Result<bool, StorageError>;

    /// Remove a user from the whitelist.
    ///
    /// Returns `Ok(false)` if the user was not whitelisted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the delete fails.
    async fn remove_from_whitelist(&self, user_id: UserId) -> Result<bool, StorageError>;

    /// List all whitelist entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the query fails.
    async fn list_whitelist(&self) -> Result<Vec<WhitelistEntry>, StorageError>;

    /// Append a turn to the user's history.
    ///
    /// The store assigns the id and stamps the turn with the current UTC time.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the insert fails.
    async fn append_turn(
        &self,
        user_id: UserId,
        role: Role,
        content: &str,
    ) -> Result<ConversationTurn, StorageError>;

    /// Get the most recent `2 * pair_limit` turns of a user.
    ///
    /// The result is in chronological order (oldest first) regardless of how
    /// the backend scans. Fewer turns are returned when the history is short.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the query fails.
    async fn recent_turns(
        &self,
        user_id: UserId,
        pair_limit: u32,
    ) -> Result<Vec<ConversationTurn>, StorageError>;

    /// Delete every turn of a user and return how many were removed.
    ///
    /// Clearing an empty history succeeds with `0`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the delete fails.
    async fn clear_turns(&self, user_id: UserId) -> Result<u64, StorageError>;
}
