//! # Transport Layer
//!
//! TCP plumbing for the relay.
//!
//! ## Components
//! - **Connection**: per-socket inbound/outbound frame buffers
//! - **Server**: listener and event loop driving decode -> engine -> reply

pub mod connection;
pub mod server;

pub use server::{start_server, RelayServer};
