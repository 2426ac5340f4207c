//! Match registry: lifecycle and lookup for running matches.
//!
//! All per-match state hangs off an explicit registry owned by the server
//! event loop, keyed by match id, with a connection index for routing
//! inbound frames. Each match carries the cancellation handle of its
//! ticker task; removing the match aborts the ticker, so ending a match
//! deterministically stops its cadence.

use std::collections::HashMap;
use std::fmt;

use log::info;
use rand::Rng;
use shared::Role;
use tokio::task::JoinHandle;

use crate::game::MatchState;

/// Server-assigned id of one accepted connection.
pub type ConnectionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchId(pub u32);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match-{:08x}", self.0)
    }
}

/// One registered match: simulation state, the connection occupying each
/// slot, and the ticker task handle.
pub struct MatchEntry {
    pub state: MatchState,
    connections: [Option<ConnectionId>; 2],
    ticker: Option<JoinHandle<()>>,
}

impl MatchEntry {
    fn new(host: ConnectionId) -> Self {
        MatchEntry {
            state: MatchState::new(),
            connections: [Some(host), None],
            ticker: None,
        }
    }

    pub fn connection(&self, role: Role) -> Option<ConnectionId> {
        self.connections[role.index()]
    }

    /// The slot a connection occupies in this match, if any.
    pub fn role_of(&self, conn: ConnectionId) -> Option<Role> {
        if self.connections[Role::Host.index()] == Some(conn) {
            Some(Role::Host)
        } else if self.connections[Role::Guest.index()] == Some(conn) {
            Some(Role::Guest)
        } else {
            None
        }
    }

    /// The opponent's connection, if both slots are occupied.
    pub fn other_connection(&self, conn: ConnectionId) -> Option<ConnectionId> {
        self.role_of(conn)
            .and_then(|role| self.connection(role.other()))
    }

    pub fn participants(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().flatten().copied()
    }

    pub fn is_open(&self) -> bool {
        self.connections[Role::Guest.index()].is_none()
    }
}

/// All running matches, plus a connection → match index.
pub struct MatchRegistry {
    matches: HashMap<MatchId, MatchEntry>,
    by_connection: HashMap<ConnectionId, MatchId>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        MatchRegistry {
            matches: HashMap::new(),
            by_connection: HashMap::new(),
        }
    }

    /// Creates a match hosted by `host` and returns its id.
    pub fn create_match(&mut self, host: ConnectionId) -> MatchId {
        let mut rng = rand::thread_rng();
        let id = loop {
            let candidate = MatchId(rng.gen());
            if !self.matches.contains_key(&candidate) {
                break candidate;
            }
        };

        self.matches.insert(id, MatchEntry::new(host));
        self.by_connection.insert(host, id);
        info!("created {} hosted by connection {}", id, host);
        id
    }

    /// An arbitrary match still waiting for a guest.
    pub fn find_open(&self) -> Option<MatchId> {
        self.matches
            .iter()
            .find(|(_, entry)| entry.is_open())
            .map(|(id, _)| *id)
    }

    /// Seats `guest` in the open guest slot of `id`. Returns the hosting
    /// connection on success; fails if the match is unknown or full.
    pub fn join(&mut self, id: MatchId, guest: ConnectionId) -> Option<ConnectionId> {
        let entry = self.matches.get_mut(&id)?;
        if !entry.is_open() {
            return None;
        }
        entry.connections[Role::Guest.index()] = Some(guest);
        self.by_connection.insert(guest, id);
        info!("connection {} joined {}", guest, id);
        entry.connection(Role::Host)
    }

    /// Stores the ticker task handle for later cancellation.
    pub fn attach_ticker(&mut self, id: MatchId, handle: JoinHandle<()>) {
        if let Some(entry) = self.matches.get_mut(&id) {
            entry.ticker = Some(handle);
        }
    }

    /// Removes a match, aborting its ticker and dropping the connection
    /// index entries. Returns the removed entry for final notifications.
    pub fn remove(&mut self, id: MatchId) -> Option<MatchEntry> {
        let mut entry = self.matches.remove(&id)?;
        if let Some(ticker) = entry.ticker.take() {
            ticker.abort();
        }
        for conn in entry.participants() {
            self.by_connection.remove(&conn);
        }
        info!("removed {} ({} still running)", id, self.matches.len());
        Some(entry)
    }

    pub fn match_of(&self, conn: ConnectionId) -> Option<MatchId> {
        self.by_connection.get(&conn).copied()
    }

    pub fn get(&self, id: MatchId) -> Option<&MatchEntry> {
        self.matches.get(&id)
    }

    pub fn get_mut(&mut self, id: MatchId) -> Option<&mut MatchEntry> {
        self.matches.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}
