//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `RCON_GATEWAY_TOKEN` - Discord bot token
//! - `RCON_GATEWAY_SERVERS` - Space-separated guild ids
//! - `RCON_GATEWAY_DEFAULT_PREFIX` - Default command prefix
//! - `RCON_GATEWAY_DATA_DIR` - Directory for persisted state
//! - `RCON_GATEWAY_LOG_LEVEL` - Default log level

use std::env;

use tracing::warn;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "RCON_GATEWAY";

/// Apply environment variable overrides to a config.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_TOKEN", ENV_PREFIX)) {
        config.discord.token = token;
    }

    if let Ok(servers) = env::var(format!("{}_SERVERS", ENV_PREFIX)) {
        config.discord.servers = parse_id_list(&servers);
    }

    if let Ok(prefix) = env::var(format!("{}_DEFAULT_PREFIX", ENV_PREFIX)) {
        config.discord.default_prefix = prefix;
    }

    if let Ok(data_dir) = env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
        config.storage.data_dir = data_dir;
    }

    if let Ok(level) = env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
        config.logging.level = level;
    }

    config
}

/// Parse a whitespace separated list of ids, skipping anything non-numeric.
fn parse_id_list(raw: &str) -> Vec<u64> {
    raw.split_whitespace()
        .filter_map(|id| match id.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("Ignoring invalid guild id '{}'", id);
                None
            }
        })
        .collect()
}

/// Get the config file path from environment or use default.
///
/// Checks `RCON_GATEWAY_CONFIG` environment variable, otherwise returns "rcon-gateway.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "rcon-gateway.conf".to_string())
}
