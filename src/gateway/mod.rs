//! Chat command gateway.
//!
//! Classifies inbound chat messages and routes them to bot commands, the
//! channel authorization flow or the RCON server of an authorized channel.

pub mod auth_flow;
pub mod commands;
pub mod context;
pub mod dispatcher;
pub mod rcon_bridge;
pub mod sink;
pub mod state;
pub mod system_command;

#[cfg(test)]
pub mod testing;

pub use commands::CommandTable;
pub use dispatcher::Dispatcher;
pub use sink::ChatSink;
pub use state::GatewayState;
