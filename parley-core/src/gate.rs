//! Access control: whitelist membership and the administrative identity.
//!
//! [`AccessGate`] answers the per-message membership question and carries the
//! admin-only whitelist and memory operations.

use std::sync::Arc;

use thiserror::Error;

use crate::history::{UserId, WhitelistEntry};
use crate::storage::{ChatStore, StorageError};

/// Errors from gated operations.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The caller is not the configured administrator.
    #[error("user {0} is not authorized to administer the whitelist")]
    NotAdmin(UserId),

    /// The caller is not whitelisted.
    #[error("user {0} is not whitelisted")]
    NotWhitelisted(UserId),

    /// The underlying store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Whitelist gate backed by a [`ChatStore`].
#[derive(Clone)]
pub struct AccessGate {
    store: Arc<dyn ChatStore>,
    admin_id: Option<UserId>,
}

impl AccessGate {
    /// Create a gate. With `admin_id` unset nobody is an administrator.
    pub fn new(store: Arc<dyn ChatStore>, admin_id: Option<UserId>) -> Self {
        Self { store, admin_id }
    }

    /// Whitelist membership. No side effects.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lookup fails.
    pub async fn check_access(&self, user_id: UserId) -> Result<bool, StorageError> {
        self.store.is_whitelisted(user_id).await
    }

    /// Whether `user_id` is the configured administrator.
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_id == Some(user_id)
    }

    /// Fail with [`AccessError::NotAdmin`] unless `actor` is the administrator.
    pub fn require_admin(&self, actor: UserId) -> Result<(), AccessError> {
        if self.is_admin(actor) {
            Ok(())
        } else {
            tracing::warn!(actor, "gate: admin operation refused");
            Err(AccessError::NotAdmin(actor))
        }
    }

    /// Fail with [`AccessError::NotWhitelisted`] unless `user_id` is a member.
    ///
    /// # Errors
    ///
    /// Also returns [`AccessError::Storage`] if the lookup fails.
    pub async fn require_member(&self, user_id: UserId) -> Result<(), AccessError> {
        if self.check_access(user_id).await? {
            Ok(())
        } else {
            Err(AccessError::NotWhitelisted(user_id))
        }
    }

    /// Whitelist a user. Returns `false` if they were already whitelisted.
    ///
    /// # Errors
    ///
    /// [`AccessError::NotAdmin`] for non-admin callers, otherwise
    /// [`AccessError::Storage`] on store failure.
    pub async fn add_user(
        &self,
        actor: UserId,
        user_id: UserId,
        display_name: &str,
    ) -> Result<bool, AccessError> {
        self.require_admin(actor)?;
        let added = self
            .store
            .add_to_whitelist(&WhitelistEntry::new(user_id, display_name))
            .await?;
        if added {
            tracing::info!(user_id, "gate: user whitelisted");
        }
        Ok(added)
    }

    /// Remove a user from the whitelist. Returns `false` if they were absent.
    ///
    /// Their history is kept; clearing it is a separate operation.
    pub async fn remove_user(&self, actor: UserId, user_id: UserId) -> Result<bool, AccessError> {
        self.require_admin(actor)?;
        let removed = self.store.remove_from_whitelist(user_id).await?;
        if removed {
            tracing::info!(user_id, "gate: user removed from whitelist");
        }
        Ok(removed)
    }

    /// All whitelist entries, oldest first.
    pub async fn list_users(&self, actor: UserId) -> Result<Vec<WhitelistEntry>, AccessError> {
        self.require_admin(actor)?;
        Ok(self.store.list_whitelist().await?)
    }

    /// Erase another user's history. Returns the number of deleted turns.
    pub async fn clear_user_memory(
        &self,
        actor: UserId,
        user_id: UserId,
    ) -> Result<u64, AccessError> {
        self.require_admin(actor)?;
        let cleared = self.store.clear_turns(user_id).await?;
        tracing::info!(user_id, cleared, "gate: history cleared by admin");
        Ok(cleared)
    }
}
