//! Inbound message classification and routing.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::common::error::StorageResult;
use crate::common::InboundMessage;
use crate::gateway::auth_flow::AuthorizationFlow;
use crate::gateway::commands::{unknown_command_reply, BotCommand, CommandTable, Resolution};
use crate::gateway::context::CommandContext;
use crate::gateway::rcon_bridge::RconBridge;
use crate::gateway::sink::ChatSink;
use crate::gateway::state::GatewayState;
use crate::gateway::system_command::{SystemCommand, PERMISSION_DENIED};
use crate::protocol::rcon::RconConnector;
use crate::system::ProcessManager;

pub const GENERIC_FAILURE: &str = "I'm sorry, something bad happened on my end :(";

/// Where a message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Command,
    Rcon,
    Authorization,
    Ignore,
}

pub struct Dispatcher {
    state: Arc<GatewayState>,
    sink: Arc<dyn ChatSink>,
    table: CommandTable,
    auth_flow: AuthorizationFlow,
    rcon_bridge: RconBridge,
    system_command: SystemCommand,
}

impl Dispatcher {
    pub fn new(
        state: Arc<GatewayState>,
        sink: Arc<dyn ChatSink>,
        connector: Arc<dyn RconConnector>,
        processes: Arc<dyn ProcessManager>,
        table: CommandTable,
    ) -> Self {
        Self {
            auth_flow: AuthorizationFlow::new(sink.clone(), state.clone(), connector.clone()),
            rcon_bridge: RconBridge::new(sink.clone(), state.clone(), connector),
            system_command: SystemCommand::new(sink.clone(), state.clone(), processes),
            state,
            sink,
            table,
        }
    }

    /// Classify `message` and hand it to exactly one component.
    ///
    /// A failing component gets a generic reply in the originating channel
    /// before its error is returned.
    pub async fn dispatch(&self, mut message: InboundMessage) -> anyhow::Result<()> {
        if message.is_self {
            return Ok(());
        }

        message.text = message.text.trim().to_string();
        let prefix = self.state.prefix_for(message.guild_id).await;
        let route = self.classify(&message, &prefix).await;
        debug!(
            "Message from {} in channel {} routed to {:?}",
            message.author_id, message.channel_id, route
        );

        let body = match route {
            Route::Ignore => return Ok(()),
            Route::Command => message.text[prefix.len()..].to_string(),
            Route::Rcon | Route::Authorization => message.text.clone(),
        };
        let channel = message.channel_id;
        let ctx = CommandContext::new(&prefix, &body, message);

        let result = match route {
            Route::Command => self.run_command(&ctx).await,
            Route::Rcon => self.rcon_bridge.forward(&ctx).await,
            Route::Authorization => self.auth_flow.handle(&ctx).await,
            Route::Ignore => Ok(()),
        };

        if let Err(e) = result {
            if let Err(send_error) = self.sink.send(channel, GENERIC_FAILURE).await {
                warn!("Failed to report error to channel {}: {}", channel, send_error);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn classify(&self, message: &InboundMessage, prefix: &str) -> Route {
        if message.text.starts_with(prefix) {
            return Route::Command;
        }

        match self.state.channel(message.channel_id).await {
            Some(record) if record.authorized => return Route::Rcon,
            Some(_) => return Route::Ignore,
            None => {}
        }

        if !message.is_direct {
            self.state.ensure_channel(message.channel_id).await;
            return Route::Ignore;
        }

        if self.auth_flow.has_session(message.author_id).await {
            Route::Authorization
        } else {
            Route::Ignore
        }
    }

    async fn run_command(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let tier = self.state.tier_of(&ctx.message).await;
        let command = match self.table.resolve(&ctx.command, tier) {
            Resolution::Run(command) => command,
            Resolution::Unknown => {
                debug!("Command {} not found", ctx.command);
                self.sink
                    .send(ctx.channel_id(), &unknown_command_reply(&ctx.command, &ctx.prefix))
                    .await?;
                return Ok(());
            }
            Resolution::Denied { required } => {
                info!(
                    "User {} with tier {} denied {} (requires {})",
                    ctx.author_id(),
                    tier,
                    ctx.command,
                    required
                );
                self.sink.send(ctx.channel_id(), PERMISSION_DENIED).await?;
                return Ok(());
            }
        };

        info!("Executing command {} {:?}", ctx.command, ctx.args);
        match command {
            BotCommand::Help => {
                self.sink
                    .send(ctx.channel_id(), &self.table.render_help(&ctx.prefix))
                    .await?;
            }
            BotCommand::SetPrefix => self.set_prefix(ctx).await?,
            BotCommand::Authorize => {
                if !ctx.in_guild() {
                    self.sink
                        .send(ctx.channel_id(), "You cannot authorize a private channel!")
                        .await?;
                } else {
                    self.auth_flow.begin(ctx).await?;
                }
            }
            BotCommand::Deauthorize => self.deauthorize(ctx).await?,
            BotCommand::Restart => self.system_command.restart(ctx).await?,
        }
        Ok(())
    }

    async fn set_prefix(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let Some(guild) = ctx.message.guild_id.filter(|_| ctx.in_guild()) else {
            self.sink
                .send(ctx.channel_id(), "You cannot change the prefix of a private channel!")
                .await?;
            return Ok(());
        };

        match ctx.args.first().filter(|prefix| !prefix.is_empty()) {
            Some(prefix) => {
                self.state.set_prefix(guild, prefix).await;
                info!("Prefix for guild {} changed to {}", guild, prefix);
                self.sink
                    .send(
                        ctx.channel_id(),
                        &format!("Your prefix has been changed to \"{}\"", prefix),
                    )
                    .await?;
            }
            None => {
                self.sink
                    .send(ctx.channel_id(), "Please enter a prefix!")
                    .await?;
            }
        }
        Ok(())
    }

    async fn deauthorize(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        if !ctx.in_guild() {
            self.sink
                .send(ctx.channel_id(), "You cannot deauthorize a private channel!")
                .await?;
            return Ok(());
        }

        let reply = if self.state.set_authorized(ctx.channel_id(), false).await {
            info!("Channel {} deauthorized by {}", ctx.channel_id(), ctx.author_id());
            "Your channel has been deauthorized."
        } else {
            "This channel is not yet authorized."
        };
        self.sink.send(ctx.channel_id(), reply).await?;
        Ok(())
    }

    /// Write the in-memory state through the store.
    pub async fn flush(&self) -> StorageResult<()> {
        self.state.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ChannelAuthRecord;
    use crate::config::DiscordConfig;
    use crate::gateway::auth_flow::AuthStage;
    use crate::gateway::testing::{direct_message, guild_message, Harness, Target};

    async fn dispatch(d: &Dispatcher, message: InboundMessage) {
        d.dispatch(message).await.unwrap();
    }

    #[tokio::test]
    async fn test_own_messages_ignored() {
        let h = Harness::new().await;
        let d = h.dispatcher();
        let mut message = guild_message(1, 10, 100, "r!help");
        message.is_self = true;

        dispatch(&d, message).await;

        assert!(h.sink.sent().is_empty());
        assert_eq!(h.state.channel(10).await, None);
    }

    #[tokio::test]
    async fn test_first_message_creates_one_record() {
        let h = Harness::new().await;
        let d = h.dispatcher();

        dispatch(&d, guild_message(1, 10, 100, "hello")).await;
        dispatch(&d, guild_message(2, 10, 100, "anyone here?")).await;

        assert_eq!(h.state.channel(10).await, Some(ChannelAuthRecord::default()));
        assert_eq!(h.store.channels().len(), 1);
        assert!(h.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_direct_message_creates_no_record() {
        let h = Harness::new().await;
        let d = h.dispatcher();

        dispatch(&d, direct_message(1, 50, "hello")).await;

        assert_eq!(h.state.channel(50).await, None);
        assert!(h.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_help_uses_guild_prefix() {
        let h = Harness::new().await;
        let d = h.dispatcher();

        dispatch(&d, guild_message(1, 10, 100, "  r!set-prefix !  ")).await;
        assert_eq!(
            h.sink.last_to(Target::Channel(10)).unwrap(),
            "Your prefix has been changed to \"!\""
        );

        dispatch(&d, guild_message(1, 10, 100, "!help")).await;
        assert!(h.sink.last_to(Target::Channel(10)).unwrap().contains("`!authorize`"));

        // Other guilds keep the default.
        dispatch(&d, guild_message(1, 20, 200, "!help")).await;
        assert_eq!(h.sink.last_to(Target::Channel(20)), None);
        dispatch(&d, guild_message(1, 20, 200, "r!help")).await;
        assert!(h.sink.last_to(Target::Channel(20)).unwrap().contains("`r!authorize`"));
    }

    #[tokio::test]
    async fn test_set_prefix_requires_argument() {
        let h = Harness::new().await;
        let d = h.dispatcher();

        dispatch(&d, guild_message(1, 10, 100, "r!set-prefix")).await;

        assert_eq!(h.sink.last_to(Target::Channel(10)).unwrap(), "Please enter a prefix!");
        assert!(h.store.prefixes().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let h = Harness::new().await;
        let d = h.dispatcher();

        dispatch(&d, guild_message(1, 10, 100, "r!Help")).await;

        let reply = h.sink.last_to(Target::Channel(10)).unwrap();
        assert!(reply.contains("No such command \"Help\""));
        assert!(reply.contains("r!help"));
    }

    #[tokio::test]
    async fn test_tier_denied_without_role() {
        let h = Harness::with_config(DiscordConfig {
            elevated_roles: vec![500],
            ..DiscordConfig::default()
        })
        .await;
        let d = h.dispatcher();

        dispatch(&d, guild_message(1, 10, 100, "r!authorize")).await;
        assert_eq!(h.sink.last_to(Target::Channel(10)).unwrap(), PERMISSION_DENIED);
        assert!(!d.auth_flow.has_session(1).await);

        let mut with_role = guild_message(1, 10, 100, "r!authorize");
        with_role.author_roles = vec![500];
        dispatch(&d, with_role).await;
        assert!(d.auth_flow.has_session(1).await);
    }

    #[tokio::test]
    async fn test_restart_requires_privilege() {
        let h = Harness::new().await;
        let d = h.dispatcher();

        dispatch(&d, guild_message(1, 10, 100, "r!restart")).await;

        assert_eq!(h.sink.last_to(Target::Channel(10)).unwrap(), PERMISSION_DENIED);
        assert!(h.processes.restarted().is_empty());
    }

    #[tokio::test]
    async fn test_full_authorization_over_dm() {
        let h = Harness::new().await;
        h.connector.respond_with("There are 3 of a max of 20 players online");
        let d = h.dispatcher();

        dispatch(&d, guild_message(1, 10, 100, "r!authorize")).await;
        dispatch(&d, direct_message(1, 50, "mc.example.com:25575 secretpw")).await;
        assert_eq!(d.auth_flow.session(1).await.unwrap().stage, AuthStage::Check);
        dispatch(&d, direct_message(1, 50, "y")).await;

        assert!(!d.auth_flow.has_session(1).await);
        assert!(h.state.channel(10).await.unwrap().authorized);
        assert_eq!(h.state.channel(50).await, None);

        dispatch(&d, guild_message(2, 10, 100, "list")).await;
        assert_eq!(h.connector.commands().last().unwrap().0, "/list");
        assert_eq!(
            h.sink.last_to(Target::Channel(10)).unwrap(),
            "There are 3 of a max of 20 players online"
        );
    }

    #[tokio::test]
    async fn test_authorize_in_dm_refused() {
        let h = Harness::new().await;
        h.store.add_privileged(1);
        let d = h.dispatcher();

        dispatch(&d, direct_message(1, 50, "r!authorize")).await;

        assert_eq!(
            h.sink.last_to(Target::Channel(50)).unwrap(),
            "You cannot authorize a private channel!"
        );
        assert!(!d.auth_flow.has_session(1).await);
    }

    #[tokio::test]
    async fn test_deauthorize() {
        let h = Harness::new().await;
        let d = h.dispatcher();

        dispatch(&d, guild_message(1, 10, 100, "r!deauthorize")).await;
        assert_eq!(
            h.sink.last_to(Target::Channel(10)).unwrap(),
            "This channel is not yet authorized."
        );

        dispatch(&d, guild_message(1, 10, 100, "r!authorize")).await;
        dispatch(&d, direct_message(1, 50, "mc.example.com:25575 pw")).await;
        dispatch(&d, direct_message(1, 50, "n")).await;
        assert!(h.state.channel(10).await.unwrap().authorized);

        dispatch(&d, guild_message(1, 10, 100, "r!deauthorize")).await;
        assert!(!h.state.channel(10).await.unwrap().authorized);
        assert!(!h.store.channels()["10"].authorized);

        // No longer forwarded.
        dispatch(&d, guild_message(1, 10, 100, "list")).await;
        assert!(h.connector.commands().is_empty());
    }

    #[tokio::test]
    async fn test_dm_without_session_ignored() {
        let h = Harness::new().await;
        let d = h.dispatcher();

        dispatch(&d, direct_message(1, 50, "mc.example.com:25575 pw")).await;

        assert!(h.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failure_gets_generic_reply() {
        let h = Harness::new().await;
        let d = h.dispatcher();

        let too_long = format!("r!set-prefix {}", "x".repeat(2100));
        let result = d.dispatch(guild_message(1, 10, 100, &too_long)).await;

        assert!(result.is_err());
        assert_eq!(h.sink.last_to(Target::Channel(10)).unwrap(), GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn test_flush_writes_store() {
        let h = Harness::new().await;
        let d = h.dispatcher();

        dispatch(&d, guild_message(1, 10, 100, "hi")).await;
        d.flush().await.unwrap();

        assert!(h.store.channels().contains_key("10"));
    }
}
