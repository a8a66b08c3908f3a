//! Game server registry
//!
//! Tracks every listed game server and its player set. All methods take
//! `&self`; callers share the registry through an `Arc` and the lock never
//! leaks past a method boundary, so snapshots handed out are stale by
//! design.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::accounts::AccountId;
use crate::registry::IdAllocator;

pub type ServerId = u32;
pub type ConnId = u32;

/// A listed game server and its current occupancy.
#[derive(Debug, Clone, Default)]
pub struct GameServer {
    pub id: ServerId,
    pub owner_conn: ConnId,
    pub owner_account: AccountId,
    pub ip: String,
    pub port: u32,
    pub name: String,
    pub description: String,
    /// Capacity. A server with N slots admits exactly N players.
    pub players_total: u8,
    pub players_ai: u8,
    pub running: bool,
    pub server_type: u8,
    pub lobby_id: u32,
    pub version: String,
    pub level: u8,
    pub game_mode: u8,
    pub hardcore: bool,
    pub map: String,
    pub data: Vec<u8>,
    pub property_mask: u32,
    /// Seated players, account id to the connection that joined them.
    pub players: HashMap<AccountId, ConnId>,
}

impl GameServer {
    pub fn is_full(&self) -> bool {
        self.players.len() + 1 > self.players_total as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("server not found")]
    NotFound,
    #[error("server is full")]
    Full,
    #[error("account already joined")]
    AlreadyJoined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
    #[error("server not found")]
    NotFound,
    #[error("connection does not own this server")]
    NotOwner,
}

/// Concurrent registry of listed game servers.
pub struct ServerRegistry {
    ids: Arc<IdAllocator>,
    inner: parking_lot::RwLock<HashMap<ServerId, GameServer>>,
}

impl ServerRegistry {
    pub fn new(ids: Arc<IdAllocator>) -> Self {
        Self {
            ids,
            inner: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    /// List a new server under a fresh id. Names are not unique; default
    /// lobby names collide routinely. Returns 0 only if the allocated id is
    /// somehow already listed.
    pub fn register(&self, name: &str) -> ServerId {
        let mut servers = self.inner.write();
        let id = self.ids.alloc();
        if servers.contains_key(&id) {
            return 0;
        }
        servers.insert(
            id,
            GameServer {
                id,
                name: name.to_string(),
                ..GameServer::default()
            },
        );
        debug!(server_id = id, name, "game server registered");
        id
    }

    pub fn get(&self, id: ServerId) -> Option<GameServer> {
        self.inner.read().get(&id).cloned()
    }

    /// Drop a server. Id 0 is the unregistered placeholder and is ignored.
    pub fn remove(&self, id: ServerId) -> Option<GameServer> {
        if id == 0 {
            return None;
        }
        self.inner.write().remove(&id)
    }

    /// Snapshot of every listed server.
    pub fn servers(&self) -> Vec<GameServer> {
        self.inner.read().values().cloned().collect()
    }

    /// Mutate a server in place under the write lock.
    pub fn configure<F>(&self, id: ServerId, f: F) -> Option<GameServer>
    where
        F: FnOnce(&mut GameServer),
    {
        let mut servers = self.inner.write();
        let server = servers.get_mut(&id)?;
        f(server);
        Some(server.clone())
    }

    /// Seat an account in a server. Capacity is checked before insertion,
    /// so a full server's player set is left untouched.
    pub fn join(&self, id: ServerId, account: AccountId, conn: ConnId) -> Result<GameServer, JoinError> {
        let mut servers = self.inner.write();
        let server = servers.get_mut(&id).ok_or(JoinError::NotFound)?;
        if server.is_full() {
            return Err(JoinError::Full);
        }
        if server.players.contains_key(&account) {
            return Err(JoinError::AlreadyJoined);
        }
        server.players.insert(account, conn);
        Ok(server.clone())
    }

    /// Unseat an account. Succeeds even when the account was not seated.
    pub fn leave(&self, id: ServerId, account: AccountId) -> Option<GameServer> {
        let mut servers = self.inner.write();
        let server = servers.get_mut(&id)?;
        server.players.remove(&account);
        Some(server.clone())
    }

    /// Mutate a server, but only for the connection that owns it.
    pub fn update_owned<F>(&self, id: ServerId, conn: ConnId, f: F) -> Result<GameServer, UpdateError>
    where
        F: FnOnce(&mut GameServer),
    {
        let mut servers = self.inner.write();
        let server = servers.get_mut(&id).ok_or(UpdateError::NotFound)?;
        if server.owner_conn != conn {
            return Err(UpdateError::NotOwner);
        }
        f(server);
        Ok(server.clone())
    }

    /// Flip the running flag, returning the updated snapshot.
    pub fn set_running(&self, id: ServerId, running: bool) -> Option<GameServer> {
        self.configure(id, |s| s.running = running)
    }

    /// Seat a player on behalf of the hosting connection.
    pub fn add_player(&self, id: ServerId, account: AccountId, conn: ConnId) -> Option<GameServer> {
        self.configure(id, |s| {
            s.players.insert(account, conn);
        })
    }

    /// Unseat a player on behalf of the hosting connection.
    pub fn remove_player(&self, id: ServerId, account: AccountId) -> Option<GameServer> {
        self.configure(id, |s| {
            s.players.remove(&account);
        })
    }
}
