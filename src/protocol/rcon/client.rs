//! RCON client sessions.
//!
//! A session is opened for exactly one command or one connectivity probe
//! and closed right after.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::common::error::{RconError, RconResult};
use crate::protocol::rcon::codec::{new_rcon_connection, RconConnection};
use crate::protocol::rcon::packet::{packet_type, RconPacket, AUTH_FAILED_ID};

/// Opens authenticated RCON sessions.
#[async_trait]
pub trait RconConnector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        password: &str,
    ) -> RconResult<Box<dyn RconSession>>;
}

/// An authenticated RCON session.
#[async_trait]
pub trait RconSession: Send {
    /// Run `command` with `args` joined by single spaces and return the response body.
    async fn run(&mut self, command: &str, args: &[String]) -> RconResult<String>;

    /// Shut the connection down.
    async fn close(self: Box<Self>) -> RconResult<()>;
}

/// Join a command and its arguments the way they are sent on the wire.
pub fn command_line(command: &str, args: &[String]) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// RCON client over any byte stream.
pub struct RconClient<S> {
    connection: RconConnection<S>,
    next_id: i32,
    io_timeout: Duration,
}

impl<S> RconClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, first_id: i32, io_timeout: Duration) -> Self {
        Self {
            connection: new_rcon_connection(stream),
            next_id: first_id,
            io_timeout,
        }
    }

    fn take_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).unwrap_or(1);
        id
    }

    /// Log in with `password`.
    pub async fn authenticate(&mut self, password: &str, host: &str, port: u16) -> RconResult<()> {
        let id = self.take_id();
        self.connection.send(RconPacket::auth(id, password)).await?;

        loop {
            let packet = self.receive().await?;
            if packet.kind != packet_type::AUTH_RESPONSE {
                // Some servers send an empty RESPONSE_VALUE before the auth result.
                debug!("Skipping packet of type {} during login", packet.kind);
                continue;
            }
            if packet.id == AUTH_FAILED_ID {
                return Err(RconError::AuthRejected {
                    host: host.to_string(),
                    port,
                });
            }
            if packet.id == id {
                return Ok(());
            }
            debug!("Ignoring auth response for unknown request id {}", packet.id);
        }
    }

    async fn execute(&mut self, command: &str, args: &[String]) -> RconResult<String> {
        let id = self.take_id();
        let line = command_line(command, args);
        debug!("RCON request {}: {}", id, line);
        self.connection.send(RconPacket::command(id, &line)).await?;

        loop {
            let packet = self.receive().await?;
            if packet.id == id && packet.kind == packet_type::RESPONSE_VALUE {
                return Ok(packet.body);
            }
            debug!(
                "Ignoring packet id {} type {} while waiting for {}",
                packet.id, packet.kind, id
            );
        }
    }

    async fn receive(&mut self) -> RconResult<RconPacket> {
        match timeout(self.io_timeout, self.connection.next()).await {
            Ok(Some(packet)) => packet,
            Ok(None) => Err(RconError::ConnectionClosed),
            Err(_) => Err(RconError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "no response from RCON server",
            ))),
        }
    }
}

#[async_trait]
impl<S> RconSession for RconClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn run(&mut self, command: &str, args: &[String]) -> RconResult<String> {
        self.execute(command, args).await
    }

    async fn close(mut self: Box<Self>) -> RconResult<()> {
        self.connection.close().await
    }
}

/// Resolve `host` with `lookup`, giving up after `limit`.
async fn resolve<F, I>(limit: Duration, host: &str, port: u16, lookup: F) -> RconResult<Vec<SocketAddr>>
where
    F: Future<Output = io::Result<I>>,
    I: Iterator<Item = SocketAddr>,
{
    let addrs: Vec<_> = timeout(limit, lookup)
        .await
        .map_err(|_| RconError::Timeout {
            host: host.to_string(),
            port,
        })?
        .map_err(|source| RconError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(RconError::Resolve {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
        });
    }
    Ok(addrs)
}

/// Connects to RCON servers over TCP.
#[derive(Debug, Clone)]
pub struct TcpRconConnector {
    timeout: Duration,
}

impl TcpRconConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RconConnector for TcpRconConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        password: &str,
    ) -> RconResult<Box<dyn RconSession>> {
        let addrs = resolve(self.timeout, host, port, lookup_host((host, port))).await?;

        let stream = timeout(self.timeout, TcpStream::connect(&addrs[..]))
            .await
            .map_err(|_| RconError::Timeout {
                host: host.to_string(),
                port,
            })?
            .map_err(|source| RconError::ConnectFailed {
                host: host.to_string(),
                port,
                source,
            })?;

        let first_id = rand::thread_rng().gen_range(1..i32::MAX / 2);
        let mut client = RconClient::new(stream, first_id, self.timeout);
        timeout(self.timeout, client.authenticate(password, host, port))
            .await
            .map_err(|_| RconError::Timeout {
                host: host.to_string(),
                port,
            })??;

        info!("RCON session opened to {}:{}", host, port);
        Ok(Box::new(client))
    }
}
