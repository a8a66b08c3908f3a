//! Message dispatch
//!
//! Frames arrive here after transport framing is stripped. The prefix
//! selects the payload family; application payloads are decoded and run
//! through two handler tables in order, lobby first, then the
//! auth-independent base table. Unknown or malformed payloads are logged
//! and dropped, never fatal.

pub mod base;
pub mod lobby;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::accounts::AccountStore;
use crate::config::LobbyConfig;
use crate::crypto::Crypto;
use crate::net::sink::ConnectionSink;
use crate::proto::payloads::UnlistServer;
use crate::proto::{encode, AppMessage, AppPayload, PayloadPrefix, PayloadReader, CHAT_MAGIC, PAYLOAD_MAGIC};
use crate::registry::servers::ConnId;
use crate::registry::{IdAllocator, ObserverRegistry, OnlineRegistry, ServerRegistry};
use crate::session::Session;

/// Shared lobby services, one instance per process.
pub struct LobbyState {
    pub config: LobbyConfig,
    pub ids: Arc<IdAllocator>,
    pub accounts: Arc<dyn AccountStore>,
    pub crypto: Arc<dyn Crypto>,
    pub sink: Arc<dyn ConnectionSink>,
    pub servers: ServerRegistry,
    /// Connections watching the server list.
    pub server_updates: ObserverRegistry,
    pub global_chat: ObserverRegistry,
    pub user_logins: ObserverRegistry,
    pub online: OnlineRegistry,
}

impl LobbyState {
    pub fn new(
        config: LobbyConfig,
        accounts: Arc<dyn AccountStore>,
        crypto: Arc<dyn Crypto>,
        sink: Arc<dyn ConnectionSink>,
        ids: Arc<IdAllocator>,
    ) -> Self {
        Self {
            config,
            servers: ServerRegistry::new(Arc::clone(&ids)),
            ids,
            accounts,
            crypto,
            sink,
            server_updates: ObserverRegistry::new(),
            global_chat: ObserverRegistry::new(),
            user_logins: ObserverRegistry::new(),
            online: OnlineRegistry::new(),
        }
    }
}

/// Per-message handler context: the shared services plus the session of
/// the connection the message came in on.
pub struct HandlerContext<'a> {
    pub state: &'a LobbyState,
    pub session: &'a mut Session,
}

impl HandlerContext<'_> {
    /// Send a payload back to the triggering connection.
    pub fn reply<P: AppPayload>(&self, payload: &P) {
        self.state.sink.send(self.session.conn, encode(payload));
    }

    /// Send a payload to some other connection. A dead connection is a
    /// quiet no-op.
    pub fn push_to<P: AppPayload>(&self, conn: ConnId, payload: &P) {
        self.state.sink.send(conn, encode(payload));
    }
}

/// Process one received frame for a connection.
pub fn handle_frame(state: &LobbyState, session: &mut Session, bytes: &[u8]) {
    let mut r = PayloadReader::new(bytes);
    let prefix = match PayloadPrefix::read(&mut r) {
        Ok(prefix) => prefix,
        Err(err) => {
            warn!(conn = session.conn, %err, "frame too short for a payload prefix");
            return;
        }
    };

    match prefix.magic {
        PAYLOAD_MAGIC => {
            if prefix.type1 != prefix.type2 {
                warn!(
                    conn = session.conn,
                    type1 = prefix.type1,
                    type2 = prefix.type2,
                    "payload type tags disagree, trusting the second"
                );
            }
            let msg = match AppMessage::decode(prefix.type2, &mut r) {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    warn!(conn = session.conn, kind = prefix.type2, "unknown payload type, dropping");
                    return;
                }
                Err(err) => {
                    warn!(conn = session.conn, kind = prefix.type2, %err, "malformed payload, dropping");
                    return;
                }
            };

            let mut ctx = HandlerContext { state, session };
            // Lobby table first, base table as the fallback.
            if let Some(msg) = lobby::handle(&mut ctx, msg) {
                if let Some(msg) = base::handle(&mut ctx, msg) {
                    debug!(conn = ctx.session.conn, ?msg, "payload has no handler, dropping");
                }
            }
        }
        CHAT_MAGIC => {
            if prefix.type1 != 0 {
                warn!(conn = session.conn, type1 = prefix.type1, "chat payload with nonzero first tag");
            }
            if prefix.type2 == 0 {
                debug!(conn = session.conn, len = r.remaining().len(), "chat channel payload, ignoring");
            } else {
                warn!(conn = session.conn, kind = prefix.type2, "unknown chat payload type, dropping");
            }
        }
        magic => {
            warn!(conn = session.conn, magic, "payload with unknown magic, dropping");
        }
    }
}

/// Tear down everything a closing connection owned: its listed server (with
/// a removal broadcast) and its online-presence entry. Observer entries are
/// left to lazy cleanup; sends to a dead connection are no-ops.
pub fn handle_close(state: &LobbyState, session: &mut Session) {
    if let Some(server_id) = session.owned_server.take() {
        if let Some(server) = state.servers.remove(server_id) {
            debug!(conn = session.conn, server_id, "removing game server of closed connection");
            for (conn, _) in state.server_updates.snapshot() {
                state.sink.send(
                    conn,
                    encode(&UnlistServer {
                        server_id,
                        running: server.running,
                        ticket: 0,
                    }),
                );
            }
        }
    }
    session.joined_server = None;
    state.online.mark_offline(session.conn);
}
