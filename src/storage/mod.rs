//! Persistence of channel authorizations, guild prefixes and privileged users.

pub mod json;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::common::error::StorageResult;
use crate::common::{ChannelAuthRecord, GuildId, UserId};

pub use json::JsonStore;

/// Channel records keyed by the channel id in string form.
pub type ChannelRecords = HashMap<String, ChannelAuthRecord>;

/// Custom command prefixes keyed by guild.
pub type GuildPrefixes = HashMap<GuildId, String>;

/// Key-value persistence used by the gateway.
///
/// Loading something that was never saved yields an empty value.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn load_channel_records(&self) -> StorageResult<ChannelRecords>;
    async fn save_channel_records(&self, records: &ChannelRecords) -> StorageResult<()>;
    async fn load_prefixes(&self) -> StorageResult<GuildPrefixes>;
    async fn save_prefixes(&self, prefixes: &GuildPrefixes) -> StorageResult<()>;
    async fn load_privileged_users(&self) -> StorageResult<HashSet<UserId>>;
}
