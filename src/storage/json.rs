//! JSON file backed store.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::debug;

use crate::common::error::{StorageError, StorageResult};
use crate::common::UserId;
use crate::storage::{ChannelRecords, GuildPrefixes, PersistenceStore};

const CHANNEL_AUTH_FILE: &str = "auth_channels.json";
const PREFIX_FILE: &str = "prefixes.json";
const PRIVILEGED_USERS_FILE: &str = "privileged_users.json";

/// Stores each record set in its own JSON file under a data directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    async fn load<T: DeserializeOwned + Default>(&self, file: &str) -> StorageResult<T> {
        let path = self.path(file);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} not found, starting empty", path.display());
                return Ok(T::default());
            }
            Err(source) => return Err(io_error(&path, source)),
        };
        if content.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&content).map_err(|source| StorageError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Write to a temporary sibling, then rename it into place.
    async fn save<T: Serialize + Sync>(&self, file: &str, value: &T) -> StorageResult<()> {
        let path = self.path(file);
        let content = serde_json::to_string_pretty(value).map_err(|source| StorageError::Json {
            path: path.display().to_string(),
            source,
        })?;

        fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|source| io_error(&self.data_dir, source))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|source| io_error(&tmp, source))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|source| io_error(&path, source))?;
        debug!("Saved {}", path.display());
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl PersistenceStore for JsonStore {
    async fn load_channel_records(&self) -> StorageResult<ChannelRecords> {
        self.load(CHANNEL_AUTH_FILE).await
    }

    async fn save_channel_records(&self, records: &ChannelRecords) -> StorageResult<()> {
        self.save(CHANNEL_AUTH_FILE, records).await
    }

    async fn load_prefixes(&self) -> StorageResult<GuildPrefixes> {
        self.load(PREFIX_FILE).await
    }

    async fn save_prefixes(&self, prefixes: &GuildPrefixes) -> StorageResult<()> {
        self.save(PREFIX_FILE, prefixes).await
    }

    async fn load_privileged_users(&self) -> StorageResult<HashSet<UserId>> {
        self.load(PRIVILEGED_USERS_FILE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ChannelAuthRecord;

    #[tokio::test]
    async fn test_missing_files_yield_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nested"));

        assert!(store.load_channel_records().await.unwrap().is_empty());
        assert!(store.load_prefixes().await.unwrap().is_empty());
        assert!(store.load_privileged_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("data"));

        let mut records = ChannelRecords::new();
        records.insert(
            "123".to_string(),
            ChannelAuthRecord {
                authorized: true,
                host: "mc.example.com".to_string(),
                port: 25575,
                password: "pw".to_string(),
                server_type: "Minecraft".to_string(),
            },
        );
        store.save_channel_records(&records).await.unwrap();

        let mut prefixes = GuildPrefixes::new();
        prefixes.insert(42, "!".to_string());
        store.save_prefixes(&prefixes).await.unwrap();

        let reopened = JsonStore::new(dir.path().join("data"));
        assert_eq!(reopened.load_channel_records().await.unwrap(), records);
        assert_eq!(reopened.load_prefixes().await.unwrap(), prefixes);
    }

    #[tokio::test]
    async fn test_privileged_users_from_array() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PRIVILEGED_USERS_FILE), "[1, 2, 3]").unwrap();

        let users = JsonStore::new(dir.path()).load_privileged_users().await.unwrap();
        assert_eq!(users, HashSet::from([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PREFIX_FILE), "").unwrap();

        assert!(JsonStore::new(dir.path()).load_prefixes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CHANNEL_AUTH_FILE), "{not json").unwrap();

        let err = JsonStore::new(dir.path()).load_channel_records().await.unwrap_err();
        assert!(matches!(err, StorageError::Json { .. }));
    }
}
