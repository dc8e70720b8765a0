//! Per-message command context.

use crate::common::{ChannelId, InboundMessage, UserId};

/// A tokenized message ready for a handler.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Prefix in effect for the message's guild.
    pub prefix: String,
    /// First space-delimited token, prefix already stripped.
    pub command: String,
    pub args: Vec<String>,
    pub message: InboundMessage,
}

impl CommandContext {
    /// Split `body` on single spaces. Consecutive spaces yield empty tokens.
    pub fn new(prefix: &str, body: &str, message: InboundMessage) -> Self {
        let mut tokens = body.split(' ').map(str::to_string);
        let command = tokens.next().unwrap_or_default();
        let args = tokens.collect();

        Self {
            prefix: prefix.to_string(),
            command,
            args,
            message,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.message.channel_id
    }

    pub fn author_id(&self) -> UserId {
        self.message.author_id
    }

    pub fn mention(&self) -> &str {
        &self.message.author_mention
    }

    pub fn in_guild(&self) -> bool {
        self.message.guild_id.is_some() && !self.message.is_direct
    }
}
