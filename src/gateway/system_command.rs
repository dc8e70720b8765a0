//! Host-level commands for privileged users.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::gateway::context::CommandContext;
use crate::gateway::sink::ChatSink;
use crate::gateway::state::GatewayState;
use crate::system::ProcessManager;

pub const PERMISSION_DENIED: &str = "You don't have permissions for this command.";

pub struct SystemCommand {
    sink: Arc<dyn ChatSink>,
    state: Arc<GatewayState>,
    processes: Arc<dyn ProcessManager>,
}

impl SystemCommand {
    pub fn new(
        sink: Arc<dyn ChatSink>,
        state: Arc<GatewayState>,
        processes: Arc<dyn ProcessManager>,
    ) -> Self {
        Self {
            sink,
            state,
            processes,
        }
    }

    /// Restart the service named after the channel's server type.
    pub async fn restart(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let channel = ctx.channel_id();
        warn!(
            "User {} ({}) tried to execute a system command: {} {:?}",
            ctx.mention(),
            ctx.author_id(),
            ctx.command,
            ctx.args
        );

        if !self.state.is_privileged(ctx.author_id()).await {
            self.sink.send(channel, PERMISSION_DENIED).await?;
            return Ok(());
        }

        let service = match self.state.channel(channel).await {
            Some(record) if !record.server_type.trim().is_empty() => {
                record.server_type.trim().to_lowercase()
            }
            _ => {
                self.sink
                    .send(channel, "This channel isn't authorized yet.")
                    .await?;
                return Ok(());
            }
        };

        match self.processes.restart_service(&service).await {
            Ok(()) => {
                info!("Restarted service {} for channel {}", service, channel);
                self.sink.send(channel, "Server is restarting").await?;
            }
            Err(e) => {
                error!("Error in system command restart: {}", e);
                self.sink
                    .send(channel, "That didn't work, sorry. Check the logs for details.")
                    .await?;
            }
        }
        Ok(())
    }
}
