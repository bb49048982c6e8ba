//! # Error Types
//!
//! Error handling for the relay protocol.
//!
//! This module defines every error variant that can occur while framing,
//! routing or transporting relay messages.
//!
//! ## Error Categories
//! - **Framing Errors**: incomplete, malformed or oversized frames
//! - **Routing Errors**: duplicate identities, unknown destinations, unregistered senders
//! - **Connection Errors**: peer disconnects and socket faults
//! - **Client Errors**: timeouts and unexpected replies
//! - **Configuration Errors**: invalid settings, logging setup failures
//!
//! Only connection-fatal errors tear a connection down; routing errors are
//! answered with a NACK frame and the connection stays open.
//!
//! ## Example Usage
//! ```rust
//! use relay_protocol::error::{ProtocolError, Result};
//!
//! fn need_header(buf: &[u8]) -> Result<()> {
//!     if buf.len() < relay_protocol::core::codec::HEADER_LEN {
//!         return Err(ProtocolError::IncompleteFrame);
//!     }
//!     Ok(())
//! }
//!
//! assert!(matches!(need_header(&[0u8; 3]), Err(ProtocolError::IncompleteFrame)));
//! ```

use std::io;
use thiserror::Error;

use crate::core::message::Identity;
use crate::protocol::registry::ConnectionId;

// ProtocolError is the primary error type for all relay operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Incomplete frame")]
    IncompleteFrame,

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Identity {0} is already registered")]
    DuplicateIdentity(Identity),

    #[error("Destination {0} is not registered")]
    UnknownDestination(Identity),

    #[error("Sender has not completed the HELLO handshake")]
    UnregisteredSender,

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Whether the peer broke the framing rules, as opposed to the link failing.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedFrame(_) | ProtocolError::OversizedPacket(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violation_classification() {
        assert!(ProtocolError::OversizedPacket(1 << 30).is_protocol_violation());
        assert!(ProtocolError::MalformedFrame("bad".into()).is_protocol_violation());

        assert!(!ProtocolError::ConnectionClosed.is_protocol_violation());
        assert!(!ProtocolError::Io(io::Error::other("reset")).is_protocol_violation());
        assert!(!ProtocolError::Timeout.is_protocol_violation());
        assert!(!ProtocolError::IncompleteFrame.is_protocol_violation());
        assert!(!ProtocolError::UnknownDestination(Identity(9)).is_protocol_violation());
    }

    #[test]
    fn test_display_includes_identity() {
        let err = ProtocolError::DuplicateIdentity(Identity(42));
        assert_eq!(err.to_string(), "Identity 42 is already registered");
    }
}
