//! Observer and presence registries
//!
//! Each broadcast topic (user logins, global chat, server-list updates)
//! gets its own [`ObserverRegistry`] instance with an independent
//! lifecycle. Fanout callers take a snapshot and iterate it outside the
//! lock; a dead connection in the snapshot is a failed send, nothing more.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::accounts::AccountId;
use crate::registry::servers::ConnId;

/// Connections subscribed to one broadcast topic.
pub struct ObserverRegistry {
    inner: RwLock<HashMap<ConnId, AccountId>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe a connection. Returns false when it was already
    /// subscribed; at most one entry per connection.
    pub fn subscribe(&self, conn: ConnId, account: AccountId) -> bool {
        let mut observers = self.inner.write();
        if observers.contains_key(&conn) {
            return false;
        }
        observers.insert(conn, account);
        true
    }

    pub fn unsubscribe(&self, conn: ConnId) -> Option<AccountId> {
        self.inner.write().remove(&conn)
    }

    pub fn snapshot(&self) -> Vec<(ConnId, AccountId)> {
        self.inner.read().iter().map(|(&c, &a)| (c, a)).collect()
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct OnlineUser {
    pub account_id: AccountId,
    pub user_name: String,
}

/// Accounts currently online via the legacy login path. Feeds the initial
/// snapshot sent to new login observers.
pub struct OnlineRegistry {
    inner: RwLock<HashMap<ConnId, OnlineUser>>,
}

impl OnlineRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn mark_online(&self, conn: ConnId, account_id: AccountId, user_name: &str) {
        self.inner.write().insert(
            conn,
            OnlineUser {
                account_id,
                user_name: user_name.to_string(),
            },
        );
    }

    pub fn mark_offline(&self, conn: ConnId) -> Option<OnlineUser> {
        self.inner.write().remove(&conn)
    }

    pub fn snapshot(&self) -> Vec<OnlineUser> {
        self.inner.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.inner.read().len()
    }
}

impl Default for OnlineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_once_per_connection() {
        let observers = ObserverRegistry::new();
        assert!(observers.subscribe(1, 2));
        assert!(!observers.subscribe(1, 2));
        assert_eq!(observers.snapshot().len(), 1);
    }

    #[test]
    fn test_unsubscribe_returns_account() {
        let observers = ObserverRegistry::new();
        observers.subscribe(1, 2);
        assert_eq!(observers.unsubscribe(1), Some(2));
        assert_eq!(observers.unsubscribe(1), None);
        assert!(observers.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let observers = ObserverRegistry::new();
        observers.subscribe(1, 2);
        let snapshot = observers.snapshot();
        observers.subscribe(3, 4);
        // The earlier snapshot does not see later subscriptions.
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_online_registry_lifecycle() {
        let online = OnlineRegistry::new();
        online.mark_online(1, 2, "alice");
        online.mark_online(3, 4, "bob");
        assert_eq!(online.count(), 2);

        let user = online.mark_offline(1).unwrap();
        assert_eq!(user.account_id, 2);
        assert_eq!(user.user_name, "alice");
        assert_eq!(online.count(), 1);
        assert!(online.mark_offline(1).is_none());
    }
}
