//! # Protocol Engine
//!
//! Registration and relay state machine.
//!
//! Each connection starts `Unregistered`. A HELLO with a free identity moves
//! it to `Registered`, where it stays until the connection is detached. The
//! engine never touches sockets: `process` returns the frames to deliver and
//! the event loop writes them.
//!
//! ## Replies
//! Every ACK/NACK is sent from [`Identity::SERVER`] to the sender's identity and
//! echoes the request's message id so clients can correlate it. A relayed SEND
//! keeps the original payload and message id but is re-addressed with the
//! sender's registered identity as source.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::core::message::{Command, Identity, Message};
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::{ConnectionId, Registry};

/// Registration state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unregistered,
    Registered(Identity),
}

impl LinkState {
    pub fn identity(self) -> Option<Identity> {
        match self {
            LinkState::Unregistered => None,
            LinkState::Registered(identity) => Some(identity),
        }
    }
}

/// A frame the event loop must write to `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub message: Message,
}

impl Delivery {
    fn new(to: ConnectionId, message: Message) -> Self {
        Self { to, message }
    }
}

#[derive(Debug, Default)]
pub struct Engine {
    registry: Registry,
    links: HashMap<ConnectionId, LinkState>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self, connection: ConnectionId) -> Option<LinkState> {
        self.links.get(&connection).copied()
    }

    pub fn connection_count(&self) -> usize {
        self.links.len()
    }

    /// Start tracking a freshly accepted connection.
    pub fn attach(&mut self, connection: ConnectionId) {
        self.links.insert(connection, LinkState::Unregistered);
    }

    /// Forget `connection` and release its identity. Safe to call twice.
    pub fn detach(&mut self, connection: ConnectionId) -> Option<Identity> {
        let identity = self.links.remove(&connection)?.identity()?;
        self.registry.unregister(identity);
        debug!(%connection, %identity, "Identity released");
        Some(identity)
    }

    /// Interpret one decoded frame from `connection`.
    pub fn process(&mut self, connection: ConnectionId, message: Message) -> Result<Vec<Delivery>> {
        let state = self
            .state(connection)
            .ok_or(ProtocolError::UnknownConnection(connection))?;

        let deliveries = match message.command {
            Command::Hello => self.handle_hello(connection, state, &message),
            Command::Send => self.handle_send(connection, state, message),
            Command::Ack | Command::Nack | Command::Unknown(_) => {
                trace!(%connection, command = %message.command, "Ignoring frame");
                Vec::new()
            }
        };
        Ok(deliveries)
    }

    fn handle_hello(
        &mut self,
        connection: ConnectionId,
        state: LinkState,
        message: &Message,
    ) -> Vec<Delivery> {
        let requested = message.source;

        if let LinkState::Registered(current) = state {
            debug!(%connection, %current, %requested, "HELLO on registered connection rejected");
            return vec![Delivery::new(connection, Message::nack(current, message.message_id))];
        }

        if requested.is_server() {
            debug!(%connection, "HELLO for reserved server identity rejected");
            return vec![Delivery::new(connection, Message::nack(requested, message.message_id))];
        }

        match self.registry.register(requested, connection) {
            Ok(()) => {
                self.links.insert(connection, LinkState::Registered(requested));
                debug!(%connection, identity = %requested, "Client registered");
                vec![Delivery::new(connection, Message::ack(requested, message.message_id))]
            }
            Err(e) => {
                debug!(%connection, error = %e, "HELLO rejected");
                vec![Delivery::new(connection, Message::nack(requested, message.message_id))]
            }
        }
    }

    fn handle_send(
        &mut self,
        connection: ConnectionId,
        state: LinkState,
        message: Message,
    ) -> Vec<Delivery> {
        let sender = match state {
            LinkState::Registered(identity) => identity,
            LinkState::Unregistered => {
                debug!(%connection, error = %ProtocolError::UnregisteredSender, "SEND rejected");
                return vec![Delivery::new(
                    connection,
                    Message::nack(message.source, message.message_id),
                )];
            }
        };

        let message_id = message.message_id;
        let dest = message.dest;
        let Some(target) = self.registry.lookup(dest) else {
            debug!(%connection, error = %ProtocolError::UnknownDestination(dest), "SEND rejected");
            return vec![Delivery::new(connection, Message::nack(sender, message_id))];
        };

        let relayed = Message::send(sender, dest, message_id, message.into_payload());
        vec![
            Delivery::new(target, relayed),
            Delivery::new(connection, Message::ack(sender, message_id)),
        ]
    }
}
