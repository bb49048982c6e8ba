//! # Relay Messages
//!
//! The logical message carried by every frame, plus the identity and command
//! types it is built from.
//!
//! Control commands (`Ack`, `Nack`, `Hello`) never carry a payload; the
//! constructors drop any payload given for them so that
//! `payload_len() == payload().len()` and the wire encoding always agree.

use bytes::Bytes;
use std::fmt;

/// Wire code for a relayed data message.
pub const CMD_SEND: u16 = 0x02;
/// Wire code for a positive reply.
pub const CMD_ACK: u16 = 0x03;
/// Wire code for a negative reply.
pub const CMD_NACK: u16 = 0x04;
/// Wire code for the registration handshake.
pub const CMD_HELLO: u16 = 0x05;

/// Numeric handle a client registers under; the routing key for `Send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(pub u32);

impl Identity {
    /// Reserved source identity of every server-originated reply.
    pub const SERVER: Identity = Identity(0);

    /// Whether this is the server's reserved identity.
    pub fn is_server(self) -> bool {
        self == Self::SERVER
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Identity {
    fn from(value: u32) -> Self {
        Identity(value)
    }
}

/// Frame command. Every 16-bit code decodes; codes outside the known set
/// are kept as `Unknown` so the engine can drop them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Send,
    Ack,
    Nack,
    Hello,
    Unknown(u16),
}

impl Command {
    /// Get the wire code for this command
    pub fn code(self) -> u16 {
        match self {
            Command::Send => CMD_SEND,
            Command::Ack => CMD_ACK,
            Command::Nack => CMD_NACK,
            Command::Hello => CMD_HELLO,
            Command::Unknown(code) => code,
        }
    }

    /// Map a wire code to a command
    pub fn from_code(code: u16) -> Self {
        match code {
            CMD_SEND => Command::Send,
            CMD_ACK => Command::Ack,
            CMD_NACK => Command::Nack,
            CMD_HELLO => Command::Hello,
            other => Command::Unknown(other),
        }
    }

    /// Control commands carry no payload.
    pub fn is_control(self) -> bool {
        matches!(self, Command::Ack | Command::Nack | Command::Hello)
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Command::Send => "SEND",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Hello => "HELLO",
            Command::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Unknown(code) => write!(f, "UNKNOWN(0x{code:04x})"),
            known => f.write_str(known.name()),
        }
    }
}

/// One relay message, the decoded form of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub source: Identity,
    pub dest: Identity,
    pub message_id: u32,
    pub command: Command,
    payload: Bytes,
}

impl Message {
    /// Build a message. The payload is discarded for control commands.
    pub fn new(
        source: Identity,
        dest: Identity,
        message_id: u32,
        command: Command,
        payload: impl Into<Bytes>,
    ) -> Self {
        let payload = if command.is_control() {
            Bytes::new()
        } else {
            payload.into()
        };
        Self {
            source,
            dest,
            message_id,
            command,
            payload,
        }
    }

    /// Registration request for `identity`.
    pub fn hello(identity: Identity, message_id: u32) -> Self {
        Self::new(identity, Identity::SERVER, message_id, Command::Hello, Bytes::new())
    }

    /// Data message from `source` to `dest`.
    pub fn send(
        source: Identity,
        dest: Identity,
        message_id: u32,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::new(source, dest, message_id, Command::Send, payload)
    }

    /// Server acknowledgement addressed to `dest`.
    pub fn ack(dest: Identity, message_id: u32) -> Self {
        Self::new(Identity::SERVER, dest, message_id, Command::Ack, Bytes::new())
    }

    /// Server rejection addressed to `dest`.
    pub fn nack(dest: Identity, message_id: u32) -> Self {
        Self::new(Identity::SERVER, dest, message_id, Command::Nack, Bytes::new())
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}
