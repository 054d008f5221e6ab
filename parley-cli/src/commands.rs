//! Subcommands of the `parley` binary.
//!
//! Defines the [`Commands`] tree parsed by `clap` and the [`handle_command`]
//! dispatcher that runs the relay and the admin operations against the
//! configured store.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Subcommand;

use parley_core::{
    ChatStore, Config, InboundMessage, OpenAiCompatProvider, Relay, Role, UserId, create_storage,
};

/// Top-level subcommands for the `parley` binary.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Send one message through the relay as a user
    Chat {
        /// Author id of the message
        #[arg(long)]
        user: UserId,

        /// Mark the author as a bot account (the message is ignored)
        #[arg(long)]
        bot: bool,

        /// Mark the message as sent in a guild channel
        #[arg(long)]
        guild: bool,

        /// Message to send (reads from stdin if not provided)
        message: Option<String>,
    },
    /// Whitelist administration (admin only)
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },
    /// Conversation memory commands
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

/// Whitelist actions. Each one is authorized against `admin_id`.
#[derive(Subcommand)]
pub(crate) enum WhitelistAction {
    /// Allow a user to chat
    Add {
        /// Id of the administrator running the command
        #[arg(long = "as", value_name = "ADMIN_ID")]
        actor: UserId,

        /// User to whitelist
        user_id: UserId,

        /// Display name stored with the entry
        #[arg(long)]
        name: Option<String>,
    },
    /// Revoke a user's access
    Remove {
        /// Id of the administrator running the command
        #[arg(long = "as", value_name = "ADMIN_ID")]
        actor: UserId,

        /// User to remove
        user_id: UserId,
    },
    /// List whitelisted users
    List {
        /// Id of the administrator running the command
        #[arg(long = "as", value_name = "ADMIN_ID")]
        actor: UserId,
    },
}

/// Memory actions.
#[derive(Subcommand)]
pub(crate) enum MemoryAction {
    /// Clear your own conversation history
    Clear {
        /// Whitelisted user whose history is cleared
        #[arg(long)]
        user: UserId,
    },
    /// Clear another user's conversation history (admin only)
    ClearUser {
        /// Id of the administrator running the command
        #[arg(long = "as", value_name = "ADMIN_ID")]
        actor: UserId,

        /// User whose history is cleared
        user_id: UserId,
    },
    /// Show the context window sent with the user's next message
    Show {
        /// User whose history is shown
        #[arg(long)]
        user: UserId,

        /// Number of user/assistant pairs (defaults to completion.history_pairs)
        #[arg(long)]
        pairs: Option<u32>,
    },
}

/// Handle a subcommand with the loaded configuration.
pub(crate) async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let storage: Arc<dyn ChatStore> = Arc::from(
        create_storage(config.database_url())
            .await
            .context("Failed to create storage")?,
    );
    let relay = build_relay(config, storage.clone())?;

    match command {
        Commands::Chat {
            user,
            bot,
            guild,
            message,
        } => {
            let text = read_message(message)?;
            let inbound = InboundMessage {
                author_id: user,
                text,
                is_bot_author: bot,
                has_guild_context: guild,
            };

            let reply = tokio::select! {
                reply = relay.handle_message(&inbound) => {
                    reply.context("Failed to process message")?
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("[Interrupted]");
                    return Ok(());
                }
            };

            match reply {
                Some(chunks) => print_chunks(&chunks),
                None => eprintln!("Message ignored (bot author, empty text, or user not whitelisted)."),
            }
        }
        Commands::Whitelist { action } => match action {
            WhitelistAction::Add {
                actor,
                user_id,
                name,
            } => {
                let name = name.unwrap_or_else(|| user_id.to_string());
                let added = relay
                    .gate()
                    .add_user(actor, user_id, &name)
                    .await
                    .context("Failed to add user")?;
                if added {
                    println!("User {} whitelisted.", user_id);
                } else {
                    println!("User {} is already whitelisted.", user_id);
                }
            }
            WhitelistAction::Remove { actor, user_id } => {
                let removed = relay
                    .gate()
                    .remove_user(actor, user_id)
                    .await
                    .context("Failed to remove user")?;
                if removed {
                    println!("User {} removed from the whitelist.", user_id);
                } else {
                    println!("User {} is not whitelisted.", user_id);
                }
            }
            WhitelistAction::List { actor } => {
                let entries = relay
                    .gate()
                    .list_users(actor)
                    .await
                    .context("Failed to list whitelist")?;

                if entries.is_empty() {
                    println!("Whitelist is empty.");
                    return Ok(());
                }

                println!("{:<20}  {:<24}  ADDED", "USER ID", "NAME");
                println!("{:-<66}", "");
                for entry in entries {
                    println!(
                        "{:<20}  {:<24}  {}",
                        entry.user_id,
                        truncate(&entry.display_name, 24),
                        entry
                            .added_at
                            .with_timezone(&Local)
                            .format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        },
        Commands::Memory { action } => match action {
            MemoryAction::Clear { user } => {
                let cleared = relay
                    .clear_memory(user)
                    .await
                    .context("Failed to clear memory")?;
                println!("Conversation memory cleared ({} messages).", cleared);
            }
            MemoryAction::ClearUser { actor, user_id } => {
                let cleared = relay
                    .gate()
                    .clear_user_memory(actor, user_id)
                    .await
                    .context("Failed to clear memory")?;
                println!(
                    "Conversation memory of user {} cleared ({} messages).",
                    user_id, cleared
                );
            }
            MemoryAction::Show { user, pairs } => {
                let pairs = pairs.unwrap_or(config.completion.history_pairs);
                let turns = storage
                    .recent_turns(user, pairs)
                    .await
                    .context("Failed to load history")?;

                if turns.is_empty() {
                    println!("No conversation history for user {}.", user);
                    return Ok(());
                }

                for turn in turns {
                    let role_label = match turn.role {
                        Role::User => "[USER]",
                        Role::Assistant => "[ASSISTANT]",
                    };
                    println!(
                        "{} {}",
                        role_label,
                        turn.timestamp
                            .with_timezone(&Local)
                            .format("%Y-%m-%d %H:%M:%S")
                    );
                    println!("{}", turn.content);
                    println!();
                }
            }
        },
    }

    Ok(())
}

fn build_relay(config: &Config, storage: Arc<dyn ChatStore>) -> Result<Relay> {
    let provider = OpenAiCompatProvider::new(
        config.completion.endpoint.clone(),
        Duration::from_secs(config.completion.timeout_secs),
    )
    .context("Failed to create completion provider")?;
    Ok(Relay::new(storage, Arc::new(provider), config))
}

/// Print chunks in order, one separator line between consecutive chunks.
fn print_chunks(chunks: &[String]) {
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            println!("{:-<40}", "");
        }
        println!("{}", chunk);
    }
}

/// Retrieves the message from the argument or stdin.
///
/// Priority: positional argument > piped stdin > error (if TTY)
fn read_message(message: Option<String>) -> Result<String> {
    if let Some(message) = message {
        return Ok(message);
    }
    if io::stdin().is_terminal() {
        bail!("No message provided: pass MESSAGE or pipe it on stdin");
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read stdin")?;
    Ok(buffer.trim_end().to_string())
}

/// Truncate to `max_chars` characters, ending with "..." if shortened.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else if max_chars <= 3 {
        ".".repeat(max_chars)
    } else {
        let kept: String = s.chars().take(max_chars - 3).collect();
        format!("{}...", kept)
    }
}
