//! Stronghold Lobby Server Library
//!
//! A matchmaking and session-relay server for a real-time strategy game's
//! multiplayer lobby: binary protocol dispatch, handshake state machine,
//! concurrent game-server registry and pub/sub observer fanout.

pub mod accounts;
pub mod config;
pub mod crypto;
pub mod handler;
pub mod net;
pub mod proto;
pub mod registry;
pub mod session;
