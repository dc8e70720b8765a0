//! Source RCON packet definitions.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::common::error::RconError;

/// Size of the id and type fields plus the two trailing null bytes.
pub const PACKET_OVERHEAD: usize = 10;

/// Upper bound for a single frame, guarding against garbage length prefixes.
pub const MAX_PACKET_SIZE: usize = 64 * 1024;

/// Packet type codes.
pub mod packet_type {
    pub const AUTH: i32 = 3;
    pub const AUTH_RESPONSE: i32 = 2;
    pub const EXEC_COMMAND: i32 = 2;
    pub const RESPONSE_VALUE: i32 = 0;
}

/// Request id a server answers with when authentication fails.
pub const AUTH_FAILED_ID: i32 = -1;

/// A single RCON packet, without the length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconPacket {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl RconPacket {
    pub fn auth(id: i32, password: &str) -> Self {
        Self {
            id,
            kind: packet_type::AUTH,
            body: password.to_string(),
        }
    }

    pub fn command(id: i32, command: &str) -> Self {
        Self {
            id,
            kind: packet_type::EXEC_COMMAND,
            body: command.to_string(),
        }
    }

    /// Value of the size field for this packet.
    pub fn wire_size(&self) -> usize {
        self.body.len() + PACKET_OVERHEAD
    }

    /// Append the packet, including its size prefix, to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(4 + self.wire_size());
        buf.put_i32_le(self.wire_size() as i32);
        buf.put_i32_le(self.id);
        buf.put_i32_le(self.kind);
        buf.put_slice(self.body.as_bytes());
        buf.put_u8(0);
        buf.put_u8(0);
    }

    /// Decode a packet from a frame that no longer carries its size prefix.
    pub fn decode(mut frame: Bytes) -> Result<Self, RconError> {
        if frame.len() < PACKET_OVERHEAD {
            return Err(RconError::InvalidPacket {
                message: format!("frame of {} bytes is too short", frame.len()),
            });
        }

        let id = frame.get_i32_le();
        let kind = frame.get_i32_le();

        // Body is null terminated, followed by one more null byte.
        let body_len = frame.iter().position(|&b| b == 0).unwrap_or(frame.len());
        let body = String::from_utf8_lossy(&frame[..body_len]).into_owned();

        Ok(Self { id, kind, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let mut buf = BytesMut::new();
        RconPacket::command(7, "list").encode(&mut buf);

        assert_eq!(
            &buf[..],
            &[
                14, 0, 0, 0, // size
                7, 0, 0, 0, // id
                2, 0, 0, 0, // type
                b'l', b'i', b's', b't', 0, 0,
            ]
        );
    }

    #[test]
    fn test_decode_strips_terminators() {
        let frame = Bytes::from_static(&[
            7, 0, 0, 0, 0, 0, 0, 0, b'o', b'k', 0, 0,
        ]);
        let packet = RconPacket::decode(frame).unwrap();
        assert_eq!(packet.id, 7);
        assert_eq!(packet.kind, packet_type::RESPONSE_VALUE);
        assert_eq!(packet.body, "ok");
    }

    #[test]
    fn test_decode_negative_id() {
        let frame = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF, 2, 0, 0, 0, 0, 0]);
        let packet = RconPacket::decode(frame).unwrap();
        assert_eq!(packet.id, AUTH_FAILED_ID);
        assert!(packet.body.is_empty());
    }

    #[test]
    fn test_decode_short_frame_fails() {
        let frame = Bytes::from_static(&[1, 0, 0, 0]);
        assert!(RconPacket::decode(frame).is_err());
    }
}
