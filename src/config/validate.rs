//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.discord.token.is_empty() {
        errors.push(
            "discord.token is required (or set RCON_GATEWAY_TOKEN)".to_string(),
        );
    }
    if config.discord.token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("discord.token has not been configured (still using placeholder)".to_string());
    }

    let prefix = &config.discord.default_prefix;
    if prefix.is_empty() {
        errors.push("discord.default_prefix must not be empty".to_string());
    }
    if prefix.chars().any(char::is_whitespace) {
        errors.push(format!(
            "discord.default_prefix '{}' must not contain whitespace",
            prefix
        ));
    }

    if config.storage.data_dir.is_empty() {
        errors.push("storage.data_dir is required".to_string());
    }
    if config.rcon.timeout_secs == 0 {
        errors.push("rcon.timeout_secs must be non-zero".to_string());
    }
    if config.system.service_manager.is_empty() {
        errors.push("system.service_manager is required".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
