//! Per-connection session state
//!
//! One [`Session`] per connection, owned by that connection's task. All
//! cross-connection state lives in the shared registries; the session only
//! carries what the handshake and the lobby handlers need to remember
//! between messages.

use crate::accounts::Account;
use crate::registry::servers::{ConnId, ServerId};

/// Handshake progress for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    /// Fresh connection, nothing negotiated.
    Unauthenticated,
    /// Shared secret established, credentials not yet verified.
    KeyExchanged,
    /// Account verified.
    Authenticated,
    /// Player profile attached.
    NicknameSelected,
}

pub struct Session {
    pub conn: ConnId,
    pub stage: AuthStage,
    /// Cached shared secret from the key exchange.
    pub shared_secret: Option<Vec<u8>>,
    pub session_key: Option<Vec<u8>>,
    pub account: Option<Account>,
    /// Server this connection registered and hosts.
    pub owned_server: Option<ServerId>,
    /// Server this connection joined as a player.
    pub joined_server: Option<ServerId>,
}

impl Session {
    pub fn new(conn: ConnId) -> Self {
        Self {
            conn,
            stage: AuthStage::Unauthenticated,
            shared_secret: None,
            session_key: None,
            account: None,
            owned_server: None,
            joined_server: None,
        }
    }

    pub fn account_id(&self) -> Option<u32> {
        self.account.as_ref().map(|a| a.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_unauthenticated() {
        let session = Session::new(7);
        assert_eq!(session.conn, 7);
        assert_eq!(session.stage, AuthStage::Unauthenticated);
        assert!(session.shared_secret.is_none());
        assert!(session.account_id().is_none());
        assert!(session.owned_server.is_none());
    }
}
