//! In-memory fakes for gateway tests.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::common::error::{
    ChatError, ChatResult, ProcessError, RconError, RconResult, StorageError, StorageResult,
};
use crate::common::{ChannelId, InboundMessage, UserId};
use crate::config::DiscordConfig;
use crate::gateway::auth_flow::AuthorizationFlow;
use crate::gateway::commands::CommandTable;
use crate::gateway::dispatcher::Dispatcher;
use crate::gateway::rcon_bridge::RconBridge;
use crate::gateway::sink::ChatSink;
use crate::gateway::state::GatewayState;
use crate::gateway::system_command::SystemCommand;
use crate::protocol::rcon::client::RconSession;
use crate::protocol::rcon::RconConnector;
use crate::storage::{ChannelRecords, GuildPrefixes, PersistenceStore};
use crate::system::ProcessManager;

const MESSAGE_LIMIT: usize = 2000;

pub fn guild_message(author: UserId, channel: ChannelId, guild: u64, text: &str) -> InboundMessage {
    InboundMessage {
        author_id: author,
        author_mention: format!("<@{}>", author),
        author_roles: Vec::new(),
        is_self: false,
        channel_id: channel,
        guild_id: Some(guild),
        is_direct: false,
        text: text.to_string(),
    }
}

pub fn direct_message(author: UserId, channel: ChannelId, text: &str) -> InboundMessage {
    InboundMessage {
        guild_id: None,
        is_direct: true,
        ..guild_message(author, channel, 0, text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Channel(ChannelId),
    Direct(UserId),
}

/// Records every delivered message.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(Target, String)>>,
    fail_direct: AtomicBool,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<(Target, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_to(&self, target: Target) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| *to == target)
            .map(|(_, text)| text.clone())
    }

    /// Make direct messages fail as if the user blocked them.
    pub fn fail_direct(&self) {
        self.fail_direct.store(true, Ordering::SeqCst);
    }

    fn record(&self, target: Target, text: &str) -> ChatResult<()> {
        let length = text.chars().count();
        if length > MESSAGE_LIMIT {
            return Err(ChatError::MessageTooLong {
                length,
                limit: MESSAGE_LIMIT,
            });
        }
        self.sent.lock().unwrap().push((target, text.to_string()));
        Ok(())
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn send(&self, channel: ChannelId, text: &str) -> ChatResult<()> {
        self.record(Target::Channel(channel), text)
    }

    async fn send_direct(&self, user: UserId, text: &str) -> ChatResult<()> {
        if self.fail_direct.load(Ordering::SeqCst) {
            return Err(ChatError::SendFailed {
                message: "Cannot send messages to this user".to_string(),
            });
        }
        self.record(Target::Direct(user), text)
    }
}

#[derive(Default)]
struct RconLog {
    connects: AtomicUsize,
    closes: AtomicUsize,
    commands: Mutex<Vec<(String, Vec<String>)>>,
}

/// Connector that answers every command with a canned response.
pub struct FakeConnector {
    reachable: AtomicBool,
    response: Mutex<String>,
    log: Arc<RconLog>,
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            response: Mutex::new(String::new()),
            log: Arc::new(RconLog::default()),
        }
    }
}

impl FakeConnector {
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn respond_with(&self, response: &str) {
        *self.response.lock().unwrap() = response.to_string();
    }

    pub fn connects(&self) -> usize {
        self.log.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.log.closes.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        self.log.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl RconConnector for FakeConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        _password: &str,
    ) -> RconResult<Box<dyn RconSession>> {
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(RconError::ConnectFailed {
                host: host.to_string(),
                port,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }
        Ok(Box::new(FakeSession {
            response: self.response.lock().unwrap().clone(),
            log: self.log.clone(),
        }))
    }
}

struct FakeSession {
    response: String,
    log: Arc<RconLog>,
}

#[async_trait]
impl RconSession for FakeSession {
    async fn run(&mut self, command: &str, args: &[String]) -> RconResult<String> {
        self.log
            .commands
            .lock()
            .unwrap()
            .push((command.to_string(), args.to_vec()));
        Ok(self.response.clone())
    }

    async fn close(self: Box<Self>) -> RconResult<()> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProcessManager {
    restarted: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl FakeProcessManager {
    pub fn restarted(&self) -> Vec<String> {
        self.restarted.lock().unwrap().clone()
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessManager for FakeProcessManager {
    async fn restart_service(&self, name: &str) -> Result<(), ProcessError> {
        self.restarted.lock().unwrap().push(name.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProcessError::Failed {
                service: name.to_string(),
                code: Some(1),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    channels: Mutex<ChannelRecords>,
    prefixes: Mutex<GuildPrefixes>,
    privileged: Mutex<HashSet<UserId>>,
    fail_saves: AtomicBool,
    save_gate: AsyncMutex<()>,
    pending_saves: AtomicUsize,
    channel_saves: AtomicUsize,
}

impl MemoryStore {
    pub fn channels(&self) -> ChannelRecords {
        self.channels.lock().unwrap().clone()
    }

    pub fn prefixes(&self) -> GuildPrefixes {
        self.prefixes.lock().unwrap().clone()
    }

    pub fn add_privileged(&self, user: UserId) {
        self.privileged.lock().unwrap().insert(user);
    }

    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    /// Park every save until the returned guard is dropped.
    pub async fn hold_saves(&self) -> AsyncMutexGuard<'_, ()> {
        self.save_gate.lock().await
    }

    /// Channel record writes that reached the store.
    pub fn channel_saves(&self) -> usize {
        self.channel_saves.load(Ordering::SeqCst)
    }

    /// Saves currently waiting on `hold_saves`.
    pub fn pending_saves(&self) -> usize {
        self.pending_saves.load(Ordering::SeqCst)
    }

    async fn check_save(&self, path: &str) -> StorageResult<()> {
        self.pending_saves.fetch_add(1, Ordering::SeqCst);
        drop(self.save_gate.lock().await);
        self.pending_saves.fetch_sub(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                path: path.to_string(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn load_channel_records(&self) -> StorageResult<ChannelRecords> {
        Ok(self.channels())
    }

    async fn save_channel_records(&self, records: &ChannelRecords) -> StorageResult<()> {
        self.check_save("auth_channels.json").await?;
        self.channel_saves.fetch_add(1, Ordering::SeqCst);
        *self.channels.lock().unwrap() = records.clone();
        Ok(())
    }

    async fn load_prefixes(&self) -> StorageResult<GuildPrefixes> {
        Ok(self.prefixes())
    }

    async fn save_prefixes(&self, prefixes: &GuildPrefixes) -> StorageResult<()> {
        self.check_save("prefixes.json").await?;
        *self.prefixes.lock().unwrap() = prefixes.clone();
        Ok(())
    }

    async fn load_privileged_users(&self) -> StorageResult<HashSet<UserId>> {
        Ok(self.privileged.lock().unwrap().clone())
    }
}

/// Gateway components wired to fakes.
pub struct Harness {
    pub sink: Arc<RecordingSink>,
    pub store: Arc<MemoryStore>,
    pub state: Arc<GatewayState>,
    pub connector: Arc<FakeConnector>,
    pub processes: Arc<FakeProcessManager>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(DiscordConfig::default()).await
    }

    pub async fn with_config(config: DiscordConfig) -> Self {
        let store = Arc::new(MemoryStore::default());
        let state = Arc::new(GatewayState::load(store.clone(), &config).await.unwrap());
        Self {
            sink: Arc::new(RecordingSink::default()),
            store,
            state,
            connector: Arc::new(FakeConnector::default()),
            processes: Arc::new(FakeProcessManager::default()),
        }
    }

    pub fn auth_flow(&self) -> AuthorizationFlow {
        AuthorizationFlow::new(self.sink.clone(), self.state.clone(), self.connector.clone())
    }

    pub fn rcon_bridge(&self) -> RconBridge {
        RconBridge::new(self.sink.clone(), self.state.clone(), self.connector.clone())
    }

    pub fn system_command(&self) -> SystemCommand {
        SystemCommand::new(self.sink.clone(), self.state.clone(), self.processes.clone())
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.state.clone(),
            self.sink.clone(),
            self.connector.clone(),
            self.processes.clone(),
            CommandTable::with_defaults(),
        )
    }
}
