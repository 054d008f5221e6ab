//! SQLite storage implementation.
//!
//! Provides [`SqliteStore`] as the default backend for history and whitelist
//! persistence.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::history::{ConversationTurn, UserId, WhitelistEntry};
use crate::message::Role;
use crate::storage::{ChatStore, StorageError};

#[cfg(test)]
mod tests;

/// SQLite-based chat storage.
///
/// Uses connection pooling and WAL mode. Runs migrations automatically on
/// startup.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SqliteStore from a database URL.
    ///
    /// The URL should be in the format `sqlite:path/to/database.db`. A leading
    /// `~/` in the path is expanded to the home directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if connection fails.
    /// Returns [`StorageError::Migration`] if migrations fail.
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        let path = expand_home(url)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Database(format!("failed to create database directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        tracing::debug!(path = %path.display(), "sqlite: store ready");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))
    }

    /// Convert an external user id to the signed column type.
    fn user_key(user_id: UserId) -> Result<i64, StorageError> {
        i64::try_from(user_id)
            .map_err(|_| StorageError::InvalidData(format!("user id out of range: {}", user_id)))
    }

    fn parse_user_id(raw: i64) -> Result<UserId, StorageError> {
        UserId::try_from(raw)
            .map_err(|_| StorageError::InvalidData(format!("negative user id: {}", raw)))
    }

    /// Fixed-width RFC 3339 so lexical order equals chronological order.
    fn format_timestamp(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| StorageError::InvalidData(format!("invalid datetime: {}", e)))
    }

    fn parse_role(raw: &str) -> Result<Role, StorageError> {
        raw.parse().map_err(StorageError::InvalidData)
    }

    fn turn_from_row(row: &SqliteRow) -> Result<ConversationTurn, StorageError> {
        let role: String = row.get("role");
        let timestamp: String = row.get("timestamp");
        Ok(ConversationTurn {
            id: row.get("id"),
            user_id: Self::parse_user_id(row.get("user_id"))?,
            role: Self::parse_role(&role)?,
            content: row.get("content"),
            timestamp: Self::parse_timestamp(&timestamp)?,
        })
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn is_whitelisted(&self, user_id: UserId) -> Result<bool, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM chat_whitelist WHERE user_id = ?
            "#,
        )
        .bind(Self::user_key(user_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn add_to_whitelist(&self, entry: &WhitelistEntry) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO chat_whitelist (user_id, display_name, added_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(Self::user_key(entry.user_id)?)
        .bind(&entry.display_name)
        .bind(Self::format_timestamp(entry.added_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_from_whitelist(&self, user_id: UserId) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            DELETE FROM chat_whitelist WHERE user_id = ?
            "#,
        )
        .bind(Self::user_key(user_id)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_whitelist(&self) -> Result<Vec<WhitelistEntry>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, display_name, added_at
            FROM chat_whitelist
            ORDER BY added_at ASC, user_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let added_at: String = row.get("added_at");
                Ok(WhitelistEntry {
                    user_id: Self::parse_user_id(row.get("user_id"))?,
                    display_name: row.get("display_name"),
                    added_at: Self::parse_timestamp(&added_at)?,
                })
            })
            .collect()
    }

    async fn append_turn(
        &self,
        user_id: UserId,
        role: Role,
        content: &str,
    ) -> Result<ConversationTurn, StorageError> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO chat_memory (user_id, role, content, timestamp)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(Self::user_key(user_id)?)
        .bind(role.as_str())
        .bind(content)
        .bind(Self::format_timestamp(timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(ConversationTurn {
            id: result.last_insert_rowid(),
            user_id,
            role,
            content: content.to_string(),
            timestamp,
        })
    }

    async fn recent_turns(
        &self,
        user_id: UserId,
        pair_limit: u32,
    ) -> Result<Vec<ConversationTurn>, StorageError> {
        // Newest-first scan bounded by the limit, flipped to chronological below.
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, role, content, timestamp
            FROM chat_memory
            WHERE user_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(Self::user_key(user_id)?)
        .bind(i64::from(pair_limit) * 2)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        let mut turns = rows
            .iter()
            .map(Self::turn_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn clear_turns(&self, user_id: UserId) -> Result<u64, StorageError> {
        let result = sqlx::query(
            r#"
            DELETE FROM chat_memory WHERE user_id = ?
            "#,
        )
        .bind(Self::user_key(user_id)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> Result<PathBuf, StorageError> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .ok_or_else(|| StorageError::Database("could not determine home directory".to_string())),
        None => Ok(PathBuf::from(path)),
    }
}

/// Create a storage backend from database URL.
///
/// Defaults to `sqlite:~/.config/parley/parley.db` if no URL provided.
///
/// # Errors
///
/// Returns [`StorageError`] if storage creation fails.
pub async fn create_storage(
    database_url: Option<&str>,
) -> Result<Box<dyn ChatStore>, StorageError> {
    let url = database_url.unwrap_or("sqlite:~/.config/parley/parley.db");
    let store = SqliteStore::new(url).await?;
    Ok(Box::new(store))
}
