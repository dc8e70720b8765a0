//! Shared types used across the application.

use serde::{Deserialize, Serialize};

/// Platform-assigned user identifier.
pub type UserId = u64;

/// Platform-assigned channel identifier.
pub type ChannelId = u64;

/// Platform-assigned guild identifier.
pub type GuildId = u64;

/// Server type assumed when the user does not name one.
pub const DEFAULT_SERVER_TYPE: &str = "Minecraft";

/// RCON authorization state of a single chat channel.
///
/// Persisted as JSON keyed by the channel id. A port of `0` means the
/// credentials have not been collected yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAuthRecord {
    #[serde(default)]
    pub authorized: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub server_type: String,
}

impl ChannelAuthRecord {
    /// Unauthorized record with credentials filled in.
    pub fn with_credentials(credentials: RconCredentials) -> Self {
        Self {
            authorized: false,
            host: credentials.host,
            port: credentials.port,
            password: credentials.password,
            server_type: credentials.server_type,
        }
    }

    /// Whether commands for this channel are sent with the Minecraft `/` prefix.
    pub fn is_minecraft(&self) -> bool {
        self.server_type == DEFAULT_SERVER_TYPE
    }
}

/// Credentials collected during channel authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconCredentials {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub server_type: String,
}

/// A chat message as seen by the gateway core.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub author_id: UserId,
    /// Mention string used to address the author in replies.
    pub author_mention: String,
    /// Role ids the author holds in the guild (empty for direct messages).
    pub author_roles: Vec<u64>,
    /// Set when the bot itself wrote the message.
    pub is_self: bool,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub is_direct: bool,
    pub text: String,
}
