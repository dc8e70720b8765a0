//! Shared in-memory gateway state.
//!
//! Holds the channel records, guild prefixes and the privileged user list.
//! Every mutation is written through to the persistence store; a failed write
//! is logged and the in-memory value stays authoritative. Map guards are
//! released before any store call, so a slow disk never holds up readers.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::common::error::StorageResult;
use crate::common::{ChannelAuthRecord, ChannelId, GuildId, InboundMessage, RconCredentials, UserId};
use crate::config::DiscordConfig;
use crate::gateway::commands::AuthTier;
use crate::storage::{ChannelRecords, GuildPrefixes, PersistenceStore};

pub struct GatewayState {
    default_prefix: String,
    elevated_roles: Vec<u64>,
    channels: RwLock<ChannelRecords>,
    prefixes: RwLock<GuildPrefixes>,
    privileged: RwLock<HashSet<UserId>>,
    // Serialise writes of a map so the last write carries the latest snapshot.
    channel_writes: Mutex<()>,
    prefix_writes: Mutex<()>,
    store: Arc<dyn PersistenceStore>,
}

impl GatewayState {
    /// Load persisted state from `store`.
    pub async fn load(
        store: Arc<dyn PersistenceStore>,
        config: &DiscordConfig,
    ) -> StorageResult<Self> {
        let channels = store.load_channel_records().await?;
        let prefixes = store.load_prefixes().await?;
        let privileged = store.load_privileged_users().await?;

        info!(
            "Loaded {} channel records ({} authorized), {} guild prefixes, {} privileged users",
            channels.len(),
            channels.values().filter(|r| r.authorized).count(),
            prefixes.len(),
            privileged.len()
        );

        Ok(Self {
            default_prefix: config.default_prefix.clone(),
            elevated_roles: config.elevated_roles.clone(),
            channels: RwLock::new(channels),
            prefixes: RwLock::new(prefixes),
            privileged: RwLock::new(privileged),
            channel_writes: Mutex::new(()),
            prefix_writes: Mutex::new(()),
            store,
        })
    }

    /// Prefix for `guild`, falling back to the default.
    pub async fn prefix_for(&self, guild: Option<GuildId>) -> String {
        let Some(guild) = guild else {
            return self.default_prefix.clone();
        };
        self.prefixes
            .read()
            .await
            .get(&guild)
            .cloned()
            .unwrap_or_else(|| self.default_prefix.clone())
    }

    pub async fn set_prefix(&self, guild: GuildId, prefix: &str) {
        self.prefixes
            .write()
            .await
            .insert(guild, prefix.to_string());
        self.persist_prefixes().await;
    }

    pub async fn channel(&self, channel: ChannelId) -> Option<ChannelAuthRecord> {
        self.channels.read().await.get(&channel.to_string()).cloned()
    }

    /// Create an empty unauthorized record for `channel` unless one exists.
    ///
    /// Returns whether a record was created.
    pub async fn ensure_channel(&self, channel: ChannelId) -> bool {
        {
            let mut channels = self.channels.write().await;
            let key = channel.to_string();
            if channels.contains_key(&key) {
                return false;
            }
            channels.insert(key, ChannelAuthRecord::default());
        }
        debug!("Created channel record for {}", channel);
        self.persist_channels().await;
        true
    }

    /// Replace the record for `channel` with unauthorized `credentials`.
    pub async fn store_credentials(&self, channel: ChannelId, credentials: RconCredentials) {
        self.channels.write().await.insert(
            channel.to_string(),
            ChannelAuthRecord::with_credentials(credentials),
        );
        self.persist_channels().await;
    }

    /// Set the authorized flag on an existing record.
    ///
    /// Returns false if the channel has no record.
    pub async fn set_authorized(&self, channel: ChannelId, authorized: bool) -> bool {
        {
            let mut channels = self.channels.write().await;
            let Some(record) = channels.get_mut(&channel.to_string()) else {
                return false;
            };
            record.authorized = authorized;
        }
        self.persist_channels().await;
        true
    }

    /// Check the privileged list, re-reading it so external edits apply immediately.
    pub async fn is_privileged(&self, user: UserId) -> bool {
        match self.store.load_privileged_users().await {
            Ok(users) => {
                let allowed = users.contains(&user);
                *self.privileged.write().await = users;
                allowed
            }
            Err(e) => {
                warn!("Failed to reload privileged users, using cached list: {}", e);
                self.privileged.read().await.contains(&user)
            }
        }
    }

    /// Highest tier the author of `message` holds.
    pub async fn tier_of(&self, message: &InboundMessage) -> AuthTier {
        if self.is_privileged(message.author_id).await {
            return AuthTier::Privileged;
        }
        let in_guild = message.guild_id.is_some() && !message.is_direct;
        let has_role = self.elevated_roles.is_empty()
            || message
                .author_roles
                .iter()
                .any(|role| self.elevated_roles.contains(role));
        if in_guild && has_role {
            AuthTier::Elevated
        } else {
            AuthTier::Open
        }
    }

    /// Write channel records and prefixes to the store.
    pub async fn flush(&self) -> StorageResult<()> {
        {
            let _writing = self.channel_writes.lock().await;
            let channels = self.channels.read().await.clone();
            self.store.save_channel_records(&channels).await?;
        }
        let _writing = self.prefix_writes.lock().await;
        let prefixes = self.prefixes.read().await.clone();
        self.store.save_prefixes(&prefixes).await
    }

    async fn persist_channels(&self) {
        let _writing = self.channel_writes.lock().await;
        let channels: ChannelRecords = self.channels.read().await.clone();
        if let Err(e) = self.store.save_channel_records(&channels).await {
            warn!("Failed to persist channel records: {}", e);
        }
    }

    async fn persist_prefixes(&self) {
        let _writing = self.prefix_writes.lock().await;
        let prefixes: GuildPrefixes = self.prefixes.read().await.clone();
        if let Err(e) = self.store.save_prefixes(&prefixes).await {
            warn!("Failed to persist guild prefixes: {}", e);
        }
    }
}
