//! Discord event handling.
//!
//! Converts serenity events into gateway calls. Every message is handled in
//! its own task so a slow RCON server never blocks other channels.

use std::sync::Arc;

use serenity::gateway::ActivityData;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::UserId as DiscordUserId;
use serenity::model::mention::Mentionable;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};

use crate::common::InboundMessage;
use crate::config::DiscordConfig;
use crate::gateway::Dispatcher;

/// Permissions requested by the invite link: view channels, send messages, read history.
const INVITE_PERMISSIONS: u64 = 68_608;

pub struct MessageHandler {
    dispatcher: Arc<Dispatcher>,
    config: DiscordConfig,
}

impl MessageHandler {
    pub fn new(dispatcher: Arc<Dispatcher>, config: DiscordConfig) -> Self {
        Self { dispatcher, config }
    }

    pub async fn handle_ready(&self, context: &Context, ready: &Ready) {
        info!("Discord bot connected as {}", ready.user.name);
        info!("Invite link: {}", invite_link(ready.application.id.get()));

        let joined: Vec<u64> = ready.guilds.iter().map(|g| g.id.get()).collect();
        for server in &self.config.servers {
            if !joined.contains(server) {
                warn!("Configured server {} has not added the bot", server);
            }
        }
        info!("Serving {} guilds", joined.len());

        context.set_activity(Some(ActivityData::playing(self.config.activity_text())));
    }

    pub fn handle_message(&self, context: &Context, message: Message) {
        let own_id = context.cache.current_user().id;
        let inbound = to_inbound(own_id, message);
        debug!(
            "Got message from {} in channel {}: {}",
            inbound.author_id, inbound.channel_id, inbound.text
        );

        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.dispatch(inbound).await {
                error!("Error handling message: {:#}", e);
            }
        });
    }
}

fn to_inbound(own_id: DiscordUserId, message: Message) -> InboundMessage {
    let author_roles = message
        .member
        .as_ref()
        .map(|member| member.roles.iter().map(|role| role.get()).collect())
        .unwrap_or_default();

    InboundMessage {
        author_id: message.author.id.get(),
        author_mention: message.author.mention().to_string(),
        author_roles,
        is_self: message.author.id == own_id,
        channel_id: message.channel_id.get(),
        guild_id: message.guild_id.map(|guild| guild.get()),
        is_direct: message.guild_id.is_none(),
        text: message.content,
    }
}

pub fn invite_link(application_id: u64) -> String {
    format!(
        "https://discord.com/api/oauth2/authorize?client_id={}&permissions={}&scope=bot",
        application_id, INVITE_PERMISSIONS
    )
}
