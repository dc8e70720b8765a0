//! Discord-backed chat sink.

use std::sync::Arc;

use serenity::async_trait;
use serenity::constants::MESSAGE_CODE_LIMIT;
use serenity::http::Http;
use serenity::model::id::{ChannelId as DiscordChannelId, UserId as DiscordUserId};
use tracing::debug;

use crate::common::error::{ChatError, ChatResult};
use crate::common::{ChannelId, UserId};
use crate::gateway::ChatSink;

/// Sends replies through the Discord REST API.
#[derive(Clone)]
pub struct DiscordSink {
    http: Arc<Http>,
}

impl DiscordSink {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

/// Reject text Discord would refuse to deliver.
pub fn check_length(text: &str) -> ChatResult<()> {
    let length = text.chars().count();
    if length > MESSAGE_CODE_LIMIT {
        return Err(ChatError::MessageTooLong {
            length,
            limit: MESSAGE_CODE_LIMIT,
        });
    }
    Ok(())
}

#[async_trait]
impl ChatSink for DiscordSink {
    async fn send(&self, channel: ChannelId, text: &str) -> ChatResult<()> {
        check_length(text)?;
        DiscordChannelId::new(channel)
            .say(&self.http, text)
            .await
            .map_err(|e| ChatError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn send_direct(&self, user: UserId, text: &str) -> ChatResult<()> {
        check_length(text)?;
        let dm = DiscordUserId::new(user)
            .create_dm_channel(&*self.http)
            .await
            .map_err(|e| ChatError::SendFailed {
                message: e.to_string(),
            })?;
        debug!("Sending direct message to {} via channel {}", user, dm.id);
        dm.id
            .say(&self.http, text)
            .await
            .map_err(|e| ChatError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }
}
