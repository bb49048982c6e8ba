//! # Core Protocol Components
//!
//! Relay messages and the binary frame codec.
//!
//! This module is the foundation of the protocol: it defines the message
//! record every other layer exchanges and how that record is framed on a
//! byte stream. Nothing here performs I/O.
//!
//! ## Components
//! - **Message**: identity-addressed record with command and payload
//! - **Codec**: frame encoding/decoding and a Tokio codec for framed streams
//!
//! ## Wire Format
//! ```text
//! [Source(4)] [Dest(4)] [MessageId(4)] [Command(2)] [PayloadLen(4)] [Payload(N)]
//! ```
//!
//! ## Limits
//! - Default payload limit: 64KB, hard ceiling 16MB
//! - Length validation before allocation

pub mod codec;
pub mod message;
