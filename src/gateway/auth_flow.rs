//! Channel authorization over direct messages.
//!
//! A user starts the flow with the `authorize` command in a guild channel.
//! The bot then collects `HOST:PORT PASSWORD [TYPE]` in a DM, optionally
//! probes the endpoint, and marks the *origin* channel as authorized.
//!
//! ```text
//! INIT --begin--> COLLECT --credentials--> CHECK --y (reachable) / n--> done
//!                   ^  |abort -> done        |
//!                   +------y (unreachable)---+
//! ```
//!
//! Transitions are computed by [`transition`] without any I/O; the
//! [`AuthorizationFlow`] executes the resulting effects.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::common::{ChannelId, RconCredentials, UserId, DEFAULT_SERVER_TYPE};
use crate::gateway::context::CommandContext;
use crate::gateway::sink::ChatSink;
use crate::gateway::state::GatewayState;
use crate::protocol::rcon::RconConnector;

const CREDENTIALS_PROMPT: &str = "Enter the RCON credentials in the following format:\n\
```\n\
HOST:PORT PASSWORD [TYPE]\n\
```\n\
HOST is the address of your RCON server, PORT its RCON port and PASSWORD the RCON password. \
TYPE is the kind of server you run (e.g. Minecraft, ARK, ...), it is optional and defaults to 'Minecraft'.\n\
Write \"abort\" to cancel.";

const CONFIRM_PROMPT: &str =
    "Wonderful. Would you like to check your login credentials for validity? (y/n)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Init,
    Collect,
    Check,
}

/// An open authorization conversation with one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub stage: AuthStage,
    /// Channel the flow was started in; credentials are written here.
    pub origin_channel: ChannelId,
}

impl AuthSession {
    pub fn new(origin_channel: ChannelId) -> Self {
        Self {
            stage: AuthStage::Init,
            origin_channel,
        }
    }
}

/// Malformed credential input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("You forgot the host. Use it like this: HOST:PORT")]
    MissingHost,
    #[error("You forgot the port. Use it like this: HOST:PORT")]
    MissingPort,
    #[error("The port has to be a number!")]
    InvalidPort,
    #[error("Sorry, that is the wrong format. Try again!")]
    MissingPassword,
}

/// Parse `HOST:PORT` plus `PASSWORD [TYPE]` arguments.
pub fn parse_credentials(command: &str, args: &[String]) -> Result<RconCredentials, CredentialError> {
    let (host, port) = command
        .rsplit_once(':')
        .ok_or(CredentialError::MissingPort)?;
    if host.is_empty() {
        return Err(CredentialError::MissingHost);
    }
    let port: u16 = port.parse().map_err(|_| CredentialError::InvalidPort)?;

    let password = match args.first() {
        Some(password) if !password.is_empty() => password.clone(),
        _ => return Err(CredentialError::MissingPassword),
    };

    let server_type = args
        .get(1)
        .map(|raw| {
            let raw = raw.strip_prefix('[').unwrap_or(raw);
            raw.strip_suffix(']').unwrap_or(raw).to_string()
        })
        .filter(|kind| !kind.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVER_TYPE.to_string());

    Ok(RconCredentials {
        host: host.to_string(),
        port,
        password,
        server_type,
    })
}

/// Input driving the state machine.
#[derive(Debug, Clone, Copy)]
pub enum AuthInput<'a> {
    /// The `authorize` command was issued.
    Begin,
    /// A message from the user while the session is open.
    Reply { command: &'a str, args: &'a [String] },
    /// Result of the connectivity probe started from CHECK.
    Probed { reachable: bool },
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEffect {
    /// Acknowledge in the origin channel and send the credential prompt by DM.
    Prompt,
    /// The user cancelled.
    Abort,
    /// Input could not be parsed; ask again.
    Reject(CredentialError),
    /// Write the credentials to the origin channel and ask for confirmation.
    Store(RconCredentials),
    /// Connect to the stored endpoint without sending a command.
    Probe,
    /// The probe failed; ask for credentials again.
    ProbeFailed,
    /// Mark the origin channel as authorized and end the session.
    Finalize { verified: bool },
    /// Neither `y` nor `n`.
    InvalidAnswer,
    /// Input that means nothing in the current stage.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// `None` ends the session.
    pub next: Option<AuthStage>,
    pub effect: AuthEffect,
}

impl Transition {
    fn to(next: AuthStage, effect: AuthEffect) -> Self {
        Self {
            next: Some(next),
            effect,
        }
    }

    fn end(effect: AuthEffect) -> Self {
        Self { next: None, effect }
    }
}

/// Compute the next stage and effect for `input` in `stage`.
pub fn transition(stage: AuthStage, input: AuthInput<'_>) -> Transition {
    match (stage, input) {
        (AuthStage::Init, AuthInput::Begin) => Transition::to(AuthStage::Collect, AuthEffect::Prompt),

        (AuthStage::Collect, AuthInput::Reply { command, args })
            if command.eq_ignore_ascii_case("abort") && args.is_empty() =>
        {
            Transition::end(AuthEffect::Abort)
        }
        (AuthStage::Collect, AuthInput::Reply { command, args }) => {
            match parse_credentials(command, args) {
                Ok(credentials) => Transition::to(AuthStage::Check, AuthEffect::Store(credentials)),
                Err(e) => Transition::to(AuthStage::Collect, AuthEffect::Reject(e)),
            }
        }

        (AuthStage::Check, AuthInput::Reply { command, .. }) if command.eq_ignore_ascii_case("y") => {
            Transition::to(AuthStage::Check, AuthEffect::Probe)
        }
        (AuthStage::Check, AuthInput::Reply { command, .. }) if command.eq_ignore_ascii_case("n") => {
            Transition::end(AuthEffect::Finalize { verified: false })
        }
        (AuthStage::Check, AuthInput::Reply { .. }) => {
            Transition::to(AuthStage::Check, AuthEffect::InvalidAnswer)
        }
        (AuthStage::Check, AuthInput::Probed { reachable: true }) => {
            Transition::end(AuthEffect::Finalize { verified: true })
        }
        (AuthStage::Check, AuthInput::Probed { reachable: false }) => {
            Transition::to(AuthStage::Collect, AuthEffect::ProbeFailed)
        }

        (stage, _) => Transition::to(stage, AuthEffect::Ignore),
    }
}

type SessionHandle = Arc<Mutex<AuthSession>>;

/// Runs authorization sessions, one per user.
///
/// Each session sits behind its own lock so a user's messages are applied
/// one at a time while other users proceed concurrently.
pub struct AuthorizationFlow {
    sessions: Mutex<HashMap<UserId, SessionHandle>>,
    sink: Arc<dyn ChatSink>,
    state: Arc<GatewayState>,
    connector: Arc<dyn RconConnector>,
}

impl AuthorizationFlow {
    pub fn new(
        sink: Arc<dyn ChatSink>,
        state: Arc<GatewayState>,
        connector: Arc<dyn RconConnector>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            sink,
            state,
            connector,
        }
    }

    pub async fn has_session(&self, user: UserId) -> bool {
        self.sessions.lock().await.contains_key(&user)
    }

    /// Snapshot of a user's session.
    #[cfg(test)]
    pub async fn session(&self, user: UserId) -> Option<AuthSession> {
        let handle = self.sessions.lock().await.get(&user).cloned()?;
        let session = handle.lock().await.clone();
        Some(session)
    }

    /// Start a session for the author with the current channel as origin.
    ///
    /// An author with an open session is told so; no second session is created.
    pub async fn begin(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let user = ctx.author_id();
        let guard = {
            let mut sessions = self.sessions.lock().await;
            if sessions.contains_key(&user) {
                None
            } else {
                let handle = Arc::new(Mutex::new(AuthSession::new(ctx.channel_id())));
                sessions.insert(user, handle.clone());
                // Uncontended: nobody else has seen this handle yet.
                Some(handle.lock_owned().await)
            }
        };

        let Some(mut guard) = guard else {
            debug!("User {} already has an open authorization", user);
            self.sink
                .send(
                    ctx.channel_id(),
                    &format!(
                        "{} you already have an authorization in progress. Check your DMs or answer \"abort\" there.",
                        ctx.mention()
                    ),
                )
                .await?;
            return Ok(());
        };

        info!(
            "User {} started authorizing channel {}",
            user,
            ctx.channel_id()
        );
        let step = transition(guard.stage, AuthInput::Begin);
        self.apply(ctx, &mut guard, step).await
    }

    /// Feed a message from a user with an open session into the state machine.
    pub async fn handle(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let user = ctx.author_id();
        let Some(handle) = self.sessions.lock().await.get(&user).cloned() else {
            return Ok(());
        };
        let mut guard = handle.clone().lock_owned().await;

        // The session may have ended while this message waited for the lock.
        if !self.is_current(user, &handle).await {
            debug!("Dropping message for finished session of user {}", user);
            return Ok(());
        }

        let step = transition(
            guard.stage,
            AuthInput::Reply {
                command: &ctx.command,
                args: &ctx.args,
            },
        );
        self.apply(ctx, &mut guard, step).await
    }

    async fn is_current(&self, user: UserId, handle: &SessionHandle) -> bool {
        self.sessions
            .lock()
            .await
            .get(&user)
            .map_or(false, |current| Arc::ptr_eq(current, handle))
    }

    async fn end(&self, user: UserId) {
        self.sessions.lock().await.remove(&user);
    }

    async fn apply(
        &self,
        ctx: &CommandContext,
        session: &mut OwnedMutexGuard<AuthSession>,
        mut step: Transition,
    ) -> anyhow::Result<()> {
        let user = ctx.author_id();
        let origin = session.origin_channel;
        let reply_channel = ctx.channel_id();

        // A probe feeds its outcome back into the machine.
        if step.effect == AuthEffect::Probe {
            let reachable = self.probe(origin).await?;
            step = transition(session.stage, AuthInput::Probed { reachable });
        }

        // Settle the session before any I/O so it never outlives a terminal step.
        match step.next {
            Some(stage) => session.stage = stage,
            None => self.end(user).await,
        }

        match step.effect {
            AuthEffect::Prompt => {
                self.sink
                    .send(
                        origin,
                        &format!(
                            "I slid into your DMs {}. Fill out the credentials there!",
                            ctx.mention()
                        ),
                    )
                    .await?;
                if let Err(e) = self.sink.send_direct(user, CREDENTIALS_PROMPT).await {
                    warn!("Could not DM user {}: {}", user, e);
                    self.end(user).await;
                    self.sink
                        .send(
                            origin,
                            &format!(
                                "I couldn't send you a direct message {}. Check your privacy settings and try again.",
                                ctx.mention()
                            ),
                        )
                        .await?;
                }
            }
            AuthEffect::Abort => {
                info!("User {} aborted authorizing channel {}", user, origin);
                self.sink
                    .send(reply_channel, "As you wish. Authorization is aborted.")
                    .await?;
                self.sink
                    .send(
                        origin,
                        &format!("Authorization aborted by {}.", ctx.mention()),
                    )
                    .await?;
            }
            AuthEffect::Reject(e) => {
                debug!("Rejected credentials from user {}: {:?}", user, e);
                self.sink.send(reply_channel, &e.to_string()).await?;
            }
            AuthEffect::Store(credentials) => {
                debug!(
                    "Storing credentials for channel {} ({}:{}, {})",
                    origin, credentials.host, credentials.port, credentials.server_type
                );
                self.state.store_credentials(origin, credentials).await;
                self.sink.send(reply_channel, CONFIRM_PROMPT).await?;
            }
            AuthEffect::ProbeFailed => {
                self.sink
                    .send(
                        reply_channel,
                        "Connection not possible. Enter your credentials again or write \"abort\".",
                    )
                    .await?;
            }
            AuthEffect::Finalize { verified } => {
                self.state.set_authorized(origin, true).await;
                info!(
                    "Channel {} authorized by user {} (verified: {})",
                    origin, user, verified
                );
                if !verified {
                    self.sink
                        .send(reply_channel, "Alright, your call.")
                        .await?;
                }
                self.sink.send(origin, "Connected!").await?;
            }
            AuthEffect::InvalidAnswer => {
                self.sink
                    .send(
                        reply_channel,
                        "That isn't valid. Try again: 'y' for yes and 'n' for no.",
                    )
                    .await?;
            }
            AuthEffect::Probe | AuthEffect::Ignore => {}
        }

        Ok(())
    }

    /// Open and immediately close a session with the origin channel's credentials.
    async fn probe(&self, origin: ChannelId) -> anyhow::Result<bool> {
        let Some(record) = self.state.channel(origin).await else {
            warn!("No credentials stored for channel {}", origin);
            return Ok(false);
        };

        match self
            .connector
            .connect(&record.host, record.port, &record.password)
            .await
        {
            Ok(session) => {
                if let Err(e) = session.close().await {
                    debug!("Error closing probe session: {}", e);
                }
                Ok(true)
            }
            Err(e) if e.is_unreachable() => {
                error!("Couldn't connect to RCON for channel {}: {}", origin, e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
