//! Framed codec for RCON connections.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::common::error::RconError;
use crate::protocol::rcon::packet::{RconPacket, MAX_PACKET_SIZE, PACKET_OVERHEAD};

/// Codec for length-prefixed RCON packets.
#[derive(Debug, Default)]
pub struct RconCodec;

impl Decoder for RconCodec {
    type Item = RconPacket;
    type Error = RconError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let size = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        if size < PACKET_OVERHEAD as i32 || size as usize > MAX_PACKET_SIZE {
            return Err(RconError::InvalidPacket {
                message: format!("invalid packet size {}", size),
            });
        }
        let size = size as usize;

        if src.len() < 4 + size {
            src.reserve(4 + size - src.len());
            return Ok(None);
        }

        src.advance(4);
        let frame = src.split_to(size).freeze();
        RconPacket::decode(frame).map(Some)
    }
}

impl Encoder<RconPacket> for RconCodec {
    type Error = RconError;

    fn encode(&mut self, item: RconPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.wire_size() > MAX_PACKET_SIZE {
            return Err(RconError::InvalidPacket {
                message: format!("command of {} bytes is too large", item.body.len()),
            });
        }
        item.encode(dst);
        Ok(())
    }
}

/// A framed RCON connection.
pub type RconConnection<S> = Framed<S, RconCodec>;

/// Create a new RCON connection from a stream.
pub fn new_rcon_connection<S: AsyncRead + AsyncWrite>(stream: S) -> RconConnection<S> {
    Framed::new(stream, RconCodec)
}
