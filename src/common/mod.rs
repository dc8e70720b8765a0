//! Common utilities and types shared across the application.

pub mod error;
pub mod types;

pub use types::{
    ChannelAuthRecord, ChannelId, GuildId, InboundMessage, RconCredentials, UserId,
    DEFAULT_SERVER_TYPE,
};
