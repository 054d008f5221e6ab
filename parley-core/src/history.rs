//! Persisted records: conversation turns and whitelist entries.

use chrono::{DateTime, Utc};

use crate::message::{Message, Role};

/// Stable external identity of a chat participant.
pub type UserId = u64;

/// One role-tagged message in a user's conversation history.
///
/// Turns for a user are ordered by `timestamp`, ties broken by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    /// Monotonically increasing identifier assigned by the store.
    pub id: i64,
    /// Owner of the turn.
    pub user_id: UserId,
    /// Who produced the content.
    pub role: Role,
    /// The text of the turn.
    pub content: String,
    /// When the turn was written (UTC).
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Convert the turn into the `{role, content}` pair sent upstream.
    pub fn to_message(&self) -> Message {
        Message::new(self.role, self.content.clone())
    }
}

impl From<ConversationTurn> for Message {
    fn from(turn: ConversationTurn) -> Self {
        Message::new(turn.role, turn.content)
    }
}

/// A user allowed to talk to the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct WhitelistEntry {
    /// Unique identity of the whitelisted user.
    pub user_id: UserId,
    /// Informational name captured when the entry was added.
    pub display_name: String,
    /// When the entry was added.
    pub added_at: DateTime<Utc>,
}

impl WhitelistEntry {
    /// Create an entry stamped with the current time.
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            added_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_to_message() {
        let turn = ConversationTurn {
            id: 7,
            user_id: 42,
            role: Role::Assistant,
            content: "hello".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(turn.to_message(), Message::assistant("hello"));
        assert_eq!(Message::from(turn), Message::assistant("hello"));
    }

    #[test]
    fn test_whitelist_entry_new() {
        let before = Utc::now();
        let entry = WhitelistEntry::new(42, "marble#0001");
        assert_eq!(entry.user_id, 42);
        assert_eq!(entry.display_name, "marble#0001");
        assert!(entry.added_at >= before);
    }
}
