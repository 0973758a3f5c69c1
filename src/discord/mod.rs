//! Discord gateway adapter.
//!
//! Receives reaction events over the serenity gateway, snapshots the
//! reacted-to message, and hands a [`ReactionEvent`] to the
//! [`ExportFlow`]. Serenity runs each event handler in its own task, so
//! handlers for different messages overlap freely.

use std::sync::Arc;

use anyhow::Context as _;
use serenity::all::{
    Client, Context, EventHandler, GatewayIntents, Reaction, Ready, UserId as DiscordUserId,
};
use serenity::async_trait;
use tracing::{debug, info, warn};

use crate::export::{ExportFlow, Outcome};
use crate::platform::{ReactionEvent, UserId};

pub mod platform;

pub use platform::DiscordPlatform;

/// Gateway intents the bot needs.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::DIRECT_MESSAGE_REACTIONS
        | GatewayIntents::MESSAGE_CONTENT
}

/// Reactor worth a message fetch: present and not the bot itself.
pub fn external_reactor(user_id: Option<DiscordUserId>, bot_user_id: UserId) -> Option<UserId> {
    user_id
        .map(|id| UserId(id.get()))
        .filter(|id| *id != bot_user_id)
}

/// Gateway event handler feeding reactions into the export flow.
pub struct ReactionHandler {
    flow: Arc<ExportFlow>,
    bot_user_id: UserId,
}

impl ReactionHandler {
    /// Create a handler for `flow` running as `bot_user_id`.
    pub fn new(flow: Arc<ExportFlow>, bot_user_id: UserId) -> Self {
        Self { flow, bot_user_id }
    }
}

#[async_trait]
impl EventHandler for ReactionHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        let Some(reactor_id) = external_reactor(reaction.user_id, self.bot_user_id) else {
            return;
        };

        // Always fetch fresh: cached copies do not track reaction counts.
        let message = match ctx
            .http
            .get_message(reaction.channel_id, reaction.message_id)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    message_id = %reaction.message_id,
                    error = %e,
                    "failed to fetch reacted message"
                );
                return;
            }
        };

        let reaction_count = message
            .reactions
            .iter()
            .find(|r| r.reaction_type == reaction.emoji)
            .map_or(0, |r| r.count);

        let event = ReactionEvent {
            reactor_id,
            glyph: reaction.emoji.to_string(),
            reaction_count,
            message: platform::to_source_message(&message, &ctx.cache, reaction.guild_id),
        };

        match self.flow.handle_reaction(event).await {
            Ok(Outcome::Ignored(reason)) => {
                debug!(message_id = %reaction.message_id, ?reason, "reaction ignored");
            }
            Ok(outcome) => {
                debug!(message_id = %reaction.message_id, ?outcome, "reaction handled");
            }
            Err(e) => {
                warn!(message_id = %reaction.message_id, error = %e, "reaction handling failed");
            }
        }
    }
}

/// Connect to the gateway and process events until Ctrl+C.
///
/// # Errors
///
/// Returns an error if the client cannot be built or the gateway
/// connection fails.
pub async fn run(token: &str, flow: Arc<ExportFlow>, bot_user_id: UserId) -> anyhow::Result<()> {
    let mut client = Client::builder(token, intents())
        .event_handler(ReactionHandler::new(flow, bot_user_id))
        .await
        .context("failed to build discord client")?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await.context("discord gateway stopped")
}
