//! Per-space, per-direction packet key storage.
//!
//! Six write-once slots: read and write for each of Initial, Handshake
//! and AppData. The TLS engine fills Handshake and AppData through
//! secrets; Initial comes from the client's first Destination
//! Connection ID.

use crate::connection::NumberSpace;
use crate::crypto::PacketKeys;
use crate::error::{Error, TransportError};
use crate::tls::{CipherSuite, Role};

/// Which way packets protected by a key travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Removing protection from received packets.
    Read,
    /// Protecting packets we send.
    Write,
}

impl Direction {
    const fn index(self) -> usize {
        match self {
            Self::Read => 0,
            Self::Write => 1,
        }
    }
}

#[derive(Debug)]
enum Slot {
    Empty,
    Installed(PacketKeys),
    /// Keys were installed and later dropped; the slot can't be reused.
    Discarded,
}

/// All packet keys of a connection.
#[derive(Debug)]
pub struct KeyStore {
    slots: [[Slot; 2]; 3],
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore {
    /// Create an empty store (no keys installed yet).
    pub const fn new() -> Self {
        Self {
            slots: [
                [Slot::Empty, Slot::Empty],
                [Slot::Empty, Slot::Empty],
                [Slot::Empty, Slot::Empty],
            ],
        }
    }

    /// Derive keys from a TLS traffic secret and install them.
    ///
    /// A slot is filled at most once. Installing into an occupied or
    /// discarded slot is an internal error and leaves the store as it was.
    pub fn install(
        &mut self,
        space: NumberSpace,
        direction: Direction,
        suite: CipherSuite,
        secret: &[u8],
    ) -> Result<(), Error> {
        self.vacant(space, direction)?;
        let keys = PacketKeys::derive(suite, secret)?;
        self.put(space, direction, keys)
    }

    /// Derive and install both Initial directions from the client's
    /// first Destination Connection ID.
    ///
    /// For a client: write = client keys, read = server keys.
    /// For a server: the reverse.
    pub fn install_initial(&mut self, role: Role, dcid: &[u8]) -> Result<(), Error> {
        self.vacant(NumberSpace::Initial, Direction::Read)?;
        self.vacant(NumberSpace::Initial, Direction::Write)?;

        let (client, server) = PacketKeys::initial(dcid)?;
        let (write, read) = match role {
            Role::Client => (client, server),
            Role::Server => (server, client),
        };
        self.put(NumberSpace::Initial, Direction::Write, write)?;
        self.put(NumberSpace::Initial, Direction::Read, read)
    }

    /// Keys for protecting or unprotecting packets in `space`, if
    /// installed and not discarded.
    pub fn lookup(&self, space: NumberSpace, direction: Direction) -> Option<&PacketKeys> {
        match &self.slots[space.index()][direction.index()] {
            Slot::Installed(keys) => Some(keys),
            Slot::Empty | Slot::Discarded => None,
        }
    }

    /// True once both directions of `space` hold keys.
    pub fn has_keys(&self, space: NumberSpace) -> bool {
        self.lookup(space, Direction::Read).is_some()
            && self.lookup(space, Direction::Write).is_some()
    }

    /// Drop both key directions of `space`.
    ///
    /// The material is wiped and the slots stay closed: a later install
    /// into this space fails.
    pub fn discard(&mut self, space: NumberSpace) {
        for slot in &mut self.slots[space.index()] {
            // PacketKeys zeroizes on drop
            *slot = Slot::Discarded;
        }
        log::debug!("discarded {:?} keys", space);
    }

    fn vacant(&self, space: NumberSpace, direction: Direction) -> Result<(), Error> {
        match self.slots[space.index()][direction.index()] {
            Slot::Empty => Ok(()),
            Slot::Installed(_) | Slot::Discarded => {
                log::warn!("{:?} {:?} keys already installed", space, direction);
                Err(Error::Transport(TransportError::InternalError))
            }
        }
    }

    fn put(&mut self, space: NumberSpace, direction: Direction, keys: PacketKeys) -> Result<(), Error> {
        self.vacant(space, direction)?;
        log::debug!("installed {:?} {:?} keys ({:?})", space, direction, keys.suite());
        self.slots[space.index()][direction.index()] = Slot::Installed(keys);
        Ok(())
    }
}
