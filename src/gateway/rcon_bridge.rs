//! Forwards chat messages from authorized channels to their RCON server.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::common::error::ChatError;
use crate::gateway::context::CommandContext;
use crate::gateway::sink::ChatSink;
use crate::gateway::state::GatewayState;
use crate::protocol::rcon::RconConnector;

const MINECRAFT_PREFIX: &str = "/";

pub const STOP_REFUSED: &str = "Nope. Only privileged users can stop the server.";
pub const CONNECTION_FAILED: &str = "Connection failed. Try authorizing this channel again.";
pub const REPLY_TOO_LONG: &str =
    "The requested message is too long for Discord. Must be 2000 or fewer in length!";

pub struct RconBridge {
    sink: Arc<dyn ChatSink>,
    state: Arc<GatewayState>,
    connector: Arc<dyn RconConnector>,
}

impl RconBridge {
    pub fn new(
        sink: Arc<dyn ChatSink>,
        state: Arc<GatewayState>,
        connector: Arc<dyn RconConnector>,
    ) -> Self {
        Self {
            sink,
            state,
            connector,
        }
    }

    /// Run the message as one RCON command and relay the response.
    ///
    /// Opens a fresh session for every call and always closes it.
    pub async fn forward(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let channel = ctx.channel_id();
        let record = match self.state.channel(channel).await {
            Some(record) if record.authorized => record,
            _ => {
                self.sink
                    .send(channel, "This channel isn't authorized yet.")
                    .await?;
                return Ok(());
            }
        };

        let bare = ctx.command.strip_prefix(MINECRAFT_PREFIX).unwrap_or(&ctx.command);
        if bare.is_empty() {
            debug!("Nothing to forward for channel {}", channel);
            return Ok(());
        }
        if bare.eq_ignore_ascii_case("stop") && !self.state.is_privileged(ctx.author_id()).await {
            info!(
                "Refused stop from non-privileged user {} in channel {}",
                ctx.author_id(),
                channel
            );
            self.sink.send(channel, STOP_REFUSED).await?;
            return Ok(());
        }

        let command = if record.is_minecraft() {
            format!("{}{}", MINECRAFT_PREFIX, bare)
        } else {
            format!("{}{}", ctx.prefix, ctx.command)
        };
        debug!("Forwarding RCON command {} {:?} for channel {}", command, ctx.args, channel);

        let mut session = match self
            .connector
            .connect(&record.host, record.port, &record.password)
            .await
        {
            Ok(session) => session,
            Err(e) if e.is_unreachable() => {
                error!("Couldn't connect to RCON for channel {}: {}", channel, e);
                self.sink.send(channel, CONNECTION_FAILED).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let result = session.run(&command, &ctx.args).await;
        if let Err(e) = session.close().await {
            debug!("Error closing RCON session: {}", e);
        }
        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_unreachable() => {
                error!("RCON command failed for channel {}: {}", channel, e);
                self.sink.send(channel, CONNECTION_FAILED).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if response.is_empty() {
            return Ok(());
        }
        match self.sink.send(channel, &response).await {
            Err(ChatError::MessageTooLong { length, .. }) => {
                error!("RCON response of {} characters is too long to relay", length);
                self.sink.send(channel, REPLY_TOO_LONG).await?;
                Ok(())
            }
            other => Ok(other?),
        }
    }
}
