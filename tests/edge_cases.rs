#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for framing limits, identity boundaries and routing
//! corner cases.

use bytes::{BufMut, Bytes, BytesMut};
use relay_protocol::core::codec::{
    self, FrameCodec, DEFAULT_MAX_PAYLOAD, HEADER_LEN, MAX_PAYLOAD_SIZE,
};
use relay_protocol::error::ProtocolError;
use relay_protocol::protocol::engine::Engine;
use relay_protocol::protocol::registry::{ConnectionId, Registry};
use relay_protocol::{Command, Identity, Message};

// ============================================================================
// FRAME CODEC EDGE CASES
// ============================================================================

#[test]
fn test_send_with_empty_payload() {
    let message = Message::send(Identity(1), Identity(2), 0, Bytes::new());
    let bytes = codec::to_bytes(&message);
    assert_eq!(bytes.len(), HEADER_LEN);

    let (decoded, used) = codec::decode(&bytes).expect("Should decode empty payload");
    assert_eq!(decoded, message);
    assert_eq!(used, HEADER_LEN);
}

#[test]
fn test_payload_exactly_at_limit() {
    let payload = vec![0xABu8; DEFAULT_MAX_PAYLOAD];
    let message = Message::send(Identity(1), Identity(2), 1, payload);
    let bytes = codec::to_bytes(&message);

    let (decoded, _) = codec::decode(&bytes).expect("Limit-sized payload should decode");
    assert_eq!(decoded.payload_len(), DEFAULT_MAX_PAYLOAD);
}

#[test]
fn test_payload_one_over_limit() {
    let message = Message::send(Identity(1), Identity(2), 1, vec![0u8; DEFAULT_MAX_PAYLOAD + 1]);
    let bytes = codec::to_bytes(&message);

    assert!(matches!(
        codec::decode(&bytes),
        Err(ProtocolError::OversizedPacket(n)) if n == DEFAULT_MAX_PAYLOAD + 1
    ));
}

#[test]
fn test_codec_limit_clamped_to_ceiling() {
    let codec = FrameCodec::new(usize::MAX);
    assert_eq!(codec.max_payload_size(), MAX_PAYLOAD_SIZE);
}

#[test]
fn test_max_field_values_roundtrip() {
    let message = Message::send(Identity(u32::MAX), Identity(u32::MAX - 1), u32::MAX, &b"edge"[..]);
    let (decoded, _) = codec::decode(&codec::to_bytes(&message)).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn test_every_control_command_rejects_payload() {
    for command in [Command::Ack, Command::Nack, Command::Hello] {
        let mut buf = BytesMut::new();
        buf.put_u32(1);
        buf.put_u32(2);
        buf.put_u32(3);
        buf.put_u16(command.code());
        buf.put_u32(1);
        buf.put_u8(0);

        assert!(
            matches!(codec::decode(&buf), Err(ProtocolError::MalformedFrame(_))),
            "{command} with payload should be malformed"
        );
    }
}

#[test]
fn test_unknown_command_may_carry_payload() {
    let command = Command::Unknown(0xFFFF);
    let message = Message::new(Identity(1), Identity(2), 3, command, vec![1u8, 2, 3]);
    let (decoded, _) = codec::decode(&codec::to_bytes(&message)).unwrap();
    assert_eq!(decoded.command, Command::Unknown(0xFFFF));
    assert_eq!(decoded.payload_len(), 3);
}

#[test]
fn test_empty_buffer_is_incomplete() {
    assert!(matches!(codec::decode(&[]), Err(ProtocolError::IncompleteFrame)));
}

// ============================================================================
// REGISTRY / ENGINE EDGE CASES
// ============================================================================

#[test]
fn test_registry_many_identities() {
    let mut registry = Registry::new();
    for i in 0..10_000u32 {
        registry.register(Identity(i), ConnectionId(u64::from(i))).unwrap();
    }
    assert_eq!(registry.len(), 10_000);
    assert_eq!(registry.lookup(Identity(9_999)), Some(ConnectionId(9_999)));
}

#[test]
fn test_empty_payload_is_relayed() {
    let mut engine = Engine::new();
    engine.attach(ConnectionId(1));
    engine.attach(ConnectionId(2));
    engine.process(ConnectionId(1), Message::hello(Identity(1), 0)).unwrap();
    engine.process(ConnectionId(2), Message::hello(Identity(2), 0)).unwrap();

    let deliveries = engine
        .process(ConnectionId(1), Message::send(Identity(1), Identity(2), 5, Bytes::new()))
        .unwrap();
    assert_eq!(deliveries[0].to, ConnectionId(2));
    assert_eq!(deliveries[0].message.payload_len(), 0);
    assert_eq!(deliveries[1].message, Message::ack(Identity(1), 5));
}

#[test]
fn test_send_to_server_identity_is_nacked() {
    let mut engine = Engine::new();
    engine.attach(ConnectionId(1));
    engine.process(ConnectionId(1), Message::hello(Identity(1), 0)).unwrap();

    let deliveries = engine
        .process(ConnectionId(1), Message::send(Identity(1), Identity::SERVER, 6, &b"?"[..]))
        .unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].message, Message::nack(Identity(1), 6));
}

#[test]
fn test_detach_unregistered_connection() {
    let mut engine = Engine::new();
    engine.attach(ConnectionId(1));
    assert_eq!(engine.detach(ConnectionId(1)), None);
    assert_eq!(engine.connection_count(), 0);
    assert_eq!(engine.detach(ConnectionId(1)), None);
}

#[test]
fn test_reattached_connection_starts_unregistered() {
    let mut engine = Engine::new();
    engine.attach(ConnectionId(1));
    engine.process(ConnectionId(1), Message::hello(Identity(4), 0)).unwrap();
    engine.detach(ConnectionId(1));

    engine.attach(ConnectionId(1));
    let deliveries = engine
        .process(ConnectionId(1), Message::send(Identity(4), Identity(4), 1, &b"x"[..]))
        .unwrap();
    assert_eq!(deliveries[0].message.command, Command::Nack);
}
