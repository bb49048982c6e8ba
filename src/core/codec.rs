//! # Frame Codec
//!
//! Stateless encoding and decoding of relay frames, plus a
//! [`tokio_util::codec`] adapter for framed streams.
//!
//! ## Wire Format
//! ```text
//! [Source(4)] [Dest(4)] [MessageId(4)] [Command(2)] [PayloadLen(4)] [Payload(N)]
//! ```
//! All integers are big-endian.
//!
//! A buffer holding less than a whole frame is *incomplete*, not corrupt: the
//! caller keeps accumulating bytes and retries. A header declaring more than the
//! configured payload limit, or a control command declaring any payload, is
//! rejected before the payload is awaited.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::message::{Command, Identity, Message};
use crate::error::{ProtocolError, Result};

/// Fixed header size in bytes
pub const HEADER_LEN: usize = 18;

/// Hard ceiling on a single payload (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Default payload limit for relayed messages (64 KB)
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

struct Header {
    source: Identity,
    dest: Identity,
    message_id: u32,
    command: Command,
    payload_len: usize,
}

fn parse_header(buf: &[u8], max_payload: usize) -> Result<Option<Header>> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let mut header = &buf[..HEADER_LEN];
    let source = Identity(header.get_u32());
    let dest = Identity(header.get_u32());
    let message_id = header.get_u32();
    let command = Command::from_code(header.get_u16());
    let payload_len = header.get_u32() as usize;

    if payload_len > max_payload.min(MAX_PAYLOAD_SIZE) {
        return Err(ProtocolError::OversizedPacket(payload_len));
    }
    if command.is_control() && payload_len != 0 {
        return Err(ProtocolError::MalformedFrame(format!(
            "{command} frame declares a {payload_len} byte payload"
        )));
    }

    Ok(Some(Header {
        source,
        dest,
        message_id,
        command,
        payload_len,
    }))
}

/// Append the wire encoding of `message` to `dst`.
pub fn encode(message: &Message, dst: &mut BytesMut) {
    // Control frames always go out with an empty payload.
    let payload: &[u8] = if message.command.is_control() {
        &[]
    } else {
        message.payload()
    };

    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u32(message.source.0);
    dst.put_u32(message.dest.0);
    dst.put_u32(message.message_id);
    dst.put_u16(message.command.code());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
}

/// Encode `message` into a standalone buffer.
pub fn to_bytes(message: &Message) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + message.payload_len());
    encode(message, &mut buf);
    buf.freeze()
}

/// Decode one frame from the front of `buf` using the default payload limit.
///
/// Returns the message and the number of bytes it occupied.
pub fn decode(buf: &[u8]) -> Result<(Message, usize)> {
    FrameCodec::default().decode_slice(buf)
}

/// Frame codec carrying the negotiated payload limit
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_payload_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl FrameCodec {
    pub fn new(max_payload_size: usize) -> Self {
        Self {
            max_payload_size: max_payload_size.min(MAX_PAYLOAD_SIZE),
        }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// Total length of the frame at the front of `buf`, or `None` while the
    /// header itself is still incomplete.
    pub fn frame_len(&self, buf: &[u8]) -> Result<Option<usize>> {
        Ok(parse_header(buf, self.max_payload_size)?.map(|h| HEADER_LEN + h.payload_len))
    }

    /// Decode one frame from the front of `buf` without consuming it.
    pub fn decode_slice(&self, buf: &[u8]) -> Result<(Message, usize)> {
        let header =
            parse_header(buf, self.max_payload_size)?.ok_or(ProtocolError::IncompleteFrame)?;
        let total = HEADER_LEN + header.payload_len;
        if buf.len() < total {
            return Err(ProtocolError::IncompleteFrame);
        }

        let payload = Bytes::copy_from_slice(&buf[HEADER_LEN..total]);
        let message = Message::new(
            header.source,
            header.dest,
            header.message_id,
            header.command,
            payload,
        );
        Ok((message, total))
    }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        let header = match parse_header(src, self.max_payload_size)? {
            Some(header) => header,
            None => {
                src.reserve(HEADER_LEN - src.len());
                return Ok(None);
            }
        };

        let total = HEADER_LEN + header.payload_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        // Split off the frame without copying the payload
        let mut frame = src.split_to(total);
        frame.advance(HEADER_LEN);
        Ok(Some(Message::new(
            header.source,
            header.dest,
            header.message_id,
            header.command,
            frame.freeze(),
        )))
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        if item.payload_len() > self.max_payload_size {
            return Err(ProtocolError::OversizedPacket(item.payload_len()));
        }
        encode(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn sample() -> Message {
        Message::send(Identity(1), Identity(2), 7, &b"hi"[..])
    }

    #[test]
    fn test_header_layout() {
        let bytes = to_bytes(&sample());
        assert_eq!(bytes.len(), HEADER_LEN + 2);
        assert_eq!(&bytes[0..4], &1u32.to_be_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_be_bytes());
        assert_eq!(&bytes[8..12], &7u32.to_be_bytes());
        assert_eq!(&bytes[12..14], &0x02u16.to_be_bytes());
        assert_eq!(&bytes[14..18], &2u32.to_be_bytes());
        assert_eq!(&bytes[18..], b"hi");
    }

    #[test]
    fn test_decode_reports_consumed_length() {
        let mut buf = BytesMut::new();
        encode(&sample(), &mut buf);
        encode(&Message::ack(Identity(1), 7), &mut buf);

        let (first, used) = decode(&buf).expect("first frame");
        assert_eq!(first, sample());
        assert_eq!(used, HEADER_LEN + 2);

        let (second, used2) = decode(&buf[used..]).expect("second frame");
        assert_eq!(second, Message::ack(Identity(1), 7));
        assert_eq!(used2, HEADER_LEN);
    }

    #[test]
    fn test_truncated_payload_is_incomplete() {
        let bytes = to_bytes(&sample());
        for cut in 0..bytes.len() {
            assert!(matches!(
                decode(&bytes[..cut]),
                Err(ProtocolError::IncompleteFrame)
            ));
        }
    }

    #[test]
    fn test_frame_len() {
        let codec = FrameCodec::default();
        let bytes = to_bytes(&sample());
        assert_eq!(codec.frame_len(&bytes[..5]).unwrap(), None);
        assert_eq!(codec.frame_len(&bytes[..HEADER_LEN]).unwrap(), Some(HEADER_LEN + 2));
    }

    #[test]
    fn test_oversized_header_rejected_early() {
        let codec = FrameCodec::new(1024);
        let mut buf = BytesMut::new();
        buf.put_u32(1);
        buf.put_u32(2);
        buf.put_u32(3);
        buf.put_u16(0x02);
        buf.put_u32(4096);
        assert!(matches!(
            codec.decode_slice(&buf),
            Err(ProtocolError::OversizedPacket(4096))
        ));
    }

    #[test]
    fn test_control_frame_with_payload_is_malformed() {
        let mut buf = BytesMut::new();
        buf.put_u32(1);
        buf.put_u32(0);
        buf.put_u32(3);
        buf.put_u16(0x05);
        buf.put_u32(2);
        buf.put_slice(b"xx");
        assert!(matches!(decode(&buf), Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn test_decoder_waits_for_payload() {
        let mut codec = FrameCodec::default();
        let bytes = to_bytes(&sample());

        let mut buf = BytesMut::from(&bytes[..HEADER_LEN]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), HEADER_LEN);

        buf.extend_from_slice(&bytes[HEADER_LEN..]);
        let decoded = codec.decode(&mut buf).unwrap().expect("complete frame");
        assert_eq!(decoded, sample());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encoder_rejects_oversized_payload() {
        let mut codec = FrameCodec::new(4);
        let mut buf = BytesMut::new();
        let msg = Message::send(Identity(1), Identity(2), 1, vec![0u8; 5]);
        assert!(matches!(
            codec.encode(msg, &mut buf),
            Err(ProtocolError::OversizedPacket(5))
        ));
        assert!(buf.is_empty());
    }
}
