use std::collections::HashMap;
use std::fmt;

use crate::core::message::Identity;
use crate::error::{ProtocolError, Result};

/// Server-assigned handle for one accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Identity -> connection routing table.
///
/// Holds connection ids only; the connections themselves are owned by the
/// event loop. At most one entry per identity.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<Identity, ConnectionId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, identity: Identity) -> Option<ConnectionId> {
        self.entries.get(&identity).copied()
    }

    pub fn contains(&self, identity: Identity) -> bool {
        self.entries.contains_key(&identity)
    }

    /// Claim `identity` for `connection`. An existing entry is never overwritten.
    pub fn register(&mut self, identity: Identity, connection: ConnectionId) -> Result<()> {
        if self.entries.contains_key(&identity) {
            return Err(ProtocolError::DuplicateIdentity(identity));
        }
        self.entries.insert(identity, connection);
        Ok(())
    }

    /// Drop `identity`. Removing an absent identity is a no-op.
    pub fn unregister(&mut self, identity: Identity) -> Option<ConnectionId> {
        self.entries.remove(&identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = Identity> + '_ {
        self.entries.keys().copied()
    }
}
