//! Source RCON protocol client.

pub mod client;
pub mod codec;
pub mod packet;

pub use client::{RconConnector, TcpRconConnector};
