//! Parley core library.
//!
//! A whitelisted conversational relay: gates access to an OpenAI-compatible
//! completion service, keeps a bounded per-user conversation history in
//! SQLite, and splits long replies into transport-sized chunks without
//! breaking code fences.

pub mod completion;
pub mod config;
pub mod format;
pub mod gate;
pub mod history;
pub mod message;
pub mod provider;
pub mod relay;
pub mod storage;

pub use completion::{ChatOutcome, CompletionClient, CompletionSettings};
pub use config::{Config, ConfigError};
pub use format::{ChunkLimits, ResponseFormatter, normalize};
pub use gate::{AccessError, AccessGate};
pub use history::{ConversationTurn, UserId, WhitelistEntry};
pub use message::{Message, Role};
pub use provider::{
    CompletionRequest, LlmProvider, MockProvider, OpenAiCompatProvider, ProviderError,
};
pub use relay::{InboundMessage, Relay};
pub use storage::{ChatStore, SqliteStore, StorageError, create_storage};
