//! Discord bot integration.
//!
//! Connects the gateway to Discord: inbound messages are converted and
//! dispatched, replies go out through [`DiscordSink`].

pub mod client;
pub mod handler;
pub mod sink;

pub use client::DiscordBot;
