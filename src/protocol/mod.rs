//! # Relay Protocol Layer
//!
//! Identity registration and message routing.
//!
//! ## Components
//! - **Registry**: identity -> connection routing table
//! - **Engine**: HELLO/SEND state machine producing ACK, NACK and relay deliveries
//!
//! ## Handshake
//! ```text
//! client                       server
//!   | HELLO(source = id)  -->   |
//!   | <-- ACK / NACK (dest=id)  |
//!   | SEND(dest = peer)   -->   | --> SEND(source = id) to peer
//!   | <-- ACK / NACK            |
//! ```

pub mod engine;
pub mod registry;
