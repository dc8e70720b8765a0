//! Configuration type definitions.

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub rcon: RconConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub token: String,
    /// Command prefix for guilds without a custom one.
    #[serde(default = "default_prefix")]
    pub default_prefix: String,
    /// Guild ids the bot is expected to serve.
    #[serde(default)]
    pub servers: Vec<u64>,
    /// Role ids that grant the elevated command tier. Empty means every guild member.
    #[serde(default)]
    pub elevated_roles: Vec<u64>,
    /// Presence text, defaults to `<default_prefix>help`.
    pub activity: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            default_prefix: default_prefix(),
            servers: Vec::new(),
            elevated_roles: Vec::new(),
            activity: None,
        }
    }
}

impl DiscordConfig {
    pub fn activity_text(&self) -> String {
        self.activity
            .clone()
            .unwrap_or_else(|| format!("{}help", self.default_prefix))
    }
}

/// Where persisted state lives.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// RCON client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RconConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// External service manager settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_service_manager")]
    pub service_manager: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            service_manager: default_service_manager(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_prefix() -> String {
    "r!".to_string()
}

fn default_data_dir() -> String {
    "/opt/rcon-gateway".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_service_manager() -> String {
    "systemctl".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
