//! Bot command registry.
//!
//! Commands are registered once at startup and looked up by exact name.
//! The table enforces the required tier before a command runs; individual
//! handlers may add finer checks on top.

use std::collections::HashMap;
use std::fmt;

/// Privilege level, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuthTier {
    Open,
    Elevated,
    Privileged,
}

impl AuthTier {
    pub fn level(&self) -> u8 {
        match self {
            Self::Open => 1,
            Self::Elevated => 2,
            Self::Privileged => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Elevated => "Elevated",
            Self::Privileged => "Privileged",
        }
    }
}

impl fmt::Display for AuthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.level())
    }
}

/// Every command the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    SetPrefix,
    Authorize,
    Deauthorize,
    Restart,
}

/// A registered command.
#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub name: String,
    pub command: BotCommand,
    pub help_text: String,
    pub tier: AuthTier,
}

/// Outcome of resolving a command name for a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Run(BotCommand),
    Unknown,
    Denied { required: AuthTier },
}

#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: Vec<CommandEntry>,
    index: HashMap<String, usize>,
}

impl CommandTable {
    /// Table containing only the built-in `help` command.
    pub fn new() -> Self {
        let mut table = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };
        table.register("help", BotCommand::Help, "Print this help text", AuthTier::Open);
        table
    }

    /// Table with every command of the gateway.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register(
            "set-prefix",
            BotCommand::SetPrefix,
            "Change the command prefix of this server",
            AuthTier::Elevated,
        );
        table.register(
            "authorize",
            BotCommand::Authorize,
            "Authorize this channel to send RCON commands",
            AuthTier::Elevated,
        );
        table.register(
            "deauthorize",
            BotCommand::Deauthorize,
            "Stop this channel from sending RCON commands",
            AuthTier::Elevated,
        );
        table.register(
            "restart",
            BotCommand::Restart,
            "Restart the server this channel is authorized for",
            AuthTier::Privileged,
        );
        table
    }

    /// Add a command, replacing any command of the same name in place.
    pub fn register(&mut self, name: &str, command: BotCommand, help_text: &str, tier: AuthTier) {
        let entry = CommandEntry {
            name: name.to_string(),
            command,
            help_text: help_text.to_string(),
            tier,
        };

        match self.index.get(name) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&CommandEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Look up `name` (case-sensitive) and check `caller` against its tier.
    pub fn resolve(&self, name: &str, caller: AuthTier) -> Resolution {
        match self.lookup(name) {
            None => Resolution::Unknown,
            Some(entry) if caller < entry.tier => Resolution::Denied {
                required: entry.tier,
            },
            Some(entry) => Resolution::Run(entry.command),
        }
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    /// Help listing in registration order.
    pub fn render_help(&self, prefix: &str) -> String {
        let mut text = String::from(
            "**Usage**\nWelcome! If you haven't already, try authorizing a channel for RCON!\n",
        );
        for entry in &self.entries {
            text.push_str(&format!(
                "\n`{}{}` - {} (Tier: {})",
                prefix, entry.name, entry.help_text, entry.tier
            ));
        }
        text
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Reply for a command name that is not registered.
pub fn unknown_command_reply(command: &str, prefix: &str) -> String {
    format!(
        "No such command \"{}\".\nTry \"{}help\" to get a list of available commands.",
        command, prefix
    )
}
