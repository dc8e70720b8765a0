//! Wire protocols spoken by the gateway.

pub mod rcon;
