//! # Relay Protocol
//!
//! An identity-addressed TCP message relay.
//!
//! Clients connect, register under a numeric [`Identity`] with a HELLO frame,
//! and then exchange SEND frames addressed by recipient identity. The server
//! stores nothing: it relays each SEND to the currently registered destination
//! and answers the sender with ACK, or with NACK when the destination is
//! absent or the identity is already taken.
//!
//! ## Layers
//! - [`core`]: message types and the binary frame codec
//! - [`protocol`]: identity registry and the registration/relay engine
//! - [`transport`]: per-connection state and the server event loop
//! - [`service`]: async client
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics
//!
//! ## Example
//! ```rust,no_run
//! use relay_protocol::config::ServerConfig;
//! use relay_protocol::{Identity, RelayClient, RelayServer};
//!
//! # async fn run() -> relay_protocol::error::Result<()> {
//! let server = RelayServer::bind(ServerConfig::default().with_port(0)).await?;
//! let addr = server.local_addr()?.to_string();
//! tokio::spawn(server.run());
//!
//! let mut alice = RelayClient::connect(&addr).await?;
//! alice.hello(Identity(1)).await?;
//! let mut bob = RelayClient::connect(&addr).await?;
//! bob.hello(Identity(2)).await?;
//!
//! alice.send(Identity(2), &b"hi"[..]).await?;
//! let relayed = bob.recv().await?;
//! assert_eq!(relayed.source, Identity(1));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::message::{Command, Identity, Message};
pub use crate::error::{ProtocolError, Result};
pub use crate::service::RelayClient;
pub use crate::transport::RelayServer;
