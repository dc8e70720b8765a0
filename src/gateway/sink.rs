//! Outbound chat seam.

use async_trait::async_trait;

use crate::common::error::ChatResult;
use crate::common::{ChannelId, UserId};

/// Sends replies back to the chat platform.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Post `text` in a channel (guild channel or an existing DM channel).
    async fn send(&self, channel: ChannelId, text: &str) -> ChatResult<()>;

    /// Open (or reuse) a direct message channel with `user` and post `text`.
    async fn send_direct(&self, user: UserId, text: &str) -> ChatResult<()>;
}
