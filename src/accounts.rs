//! Account storage
//!
//! Accounts live behind the [`AccountStore`] trait so the lobby logic does
//! not care whether they come from memory or a database. The in-memory
//! store backs both the binary and the tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::registry::IdAllocator;

pub type AccountId = u32;

/// A registered user account.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub user_name: String,
    pub player_name: String,
    pub email: String,
    /// Hashed on the cipher registration path, raw bytes on the legacy
    /// plaintext path.
    pub password: Vec<u8>,
    pub cd_key: Vec<u8>,
    pub user_data: Vec<u8>,
}

impl Account {
    /// Username with any `#tag` suffix removed.
    pub fn user_name_stripped(&self) -> &str {
        match self.user_name.split_once('#') {
            Some((name, _)) => name,
            None => &self.user_name,
        }
    }
}

/// Account CRUD keyed by id or username.
pub trait AccountStore: Send + Sync {
    /// Create an account. Returns `None` when the username is taken.
    fn create(&self, user_name: &str, password: Vec<u8>, cd_key: Vec<u8>) -> Option<AccountId>;

    fn get(&self, id: AccountId) -> Option<Account>;

    fn get_by_name(&self, user_name: &str) -> Option<Account>;

    fn set_player_name(&self, id: AccountId, player_name: &str) -> bool;

    fn set_email(&self, id: AccountId, email: &str) -> bool;

    fn set_user_data(&self, id: AccountId, data: Vec<u8>) -> bool;
}

/// In-memory [`AccountStore`].
pub struct MemoryAccounts {
    ids: Arc<IdAllocator>,
    inner: RwLock<AccountTable>,
}

#[derive(Default)]
struct AccountTable {
    by_id: HashMap<AccountId, Account>,
    by_name: HashMap<String, AccountId>,
}

impl MemoryAccounts {
    pub fn new(ids: Arc<IdAllocator>) -> Self {
        Self {
            ids,
            inner: RwLock::new(AccountTable::default()),
        }
    }
}

impl AccountStore for MemoryAccounts {
    fn create(&self, user_name: &str, password: Vec<u8>, cd_key: Vec<u8>) -> Option<AccountId> {
        let mut table = self.inner.write();
        if table.by_name.contains_key(user_name) {
            return None;
        }
        let id = self.ids.alloc();
        let account = Account {
            id,
            user_name: user_name.to_string(),
            player_name: String::new(),
            email: String::new(),
            password,
            cd_key,
            user_data: Vec::new(),
        };
        table.by_name.insert(user_name.to_string(), id);
        table.by_id.insert(id, account);
        Some(id)
    }

    fn get(&self, id: AccountId) -> Option<Account> {
        self.inner.read().by_id.get(&id).cloned()
    }

    fn get_by_name(&self, user_name: &str) -> Option<Account> {
        let table = self.inner.read();
        let id = table.by_name.get(user_name)?;
        table.by_id.get(id).cloned()
    }

    fn set_player_name(&self, id: AccountId, player_name: &str) -> bool {
        match self.inner.write().by_id.get_mut(&id) {
            Some(account) => {
                account.player_name = player_name.to_string();
                true
            }
            None => false,
        }
    }

    fn set_email(&self, id: AccountId, email: &str) -> bool {
        match self.inner.write().by_id.get_mut(&id) {
            Some(account) => {
                account.email = email.to_string();
                true
            }
            None => false,
        }
    }

    fn set_user_data(&self, id: AccountId, data: Vec<u8>) -> bool {
        match self.inner.write().by_id.get_mut(&id) {
            Some(account) => {
                account.user_data = data;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryAccounts {
        MemoryAccounts::new(Arc::new(IdAllocator::new()))
    }

    #[test]
    fn test_first_account_gets_id_two() {
        let accounts = store();
        let id = accounts.create("alice", b"pw".to_vec(), vec![0; 16]).unwrap();
        assert_eq!(id, 2);
        assert_eq!(accounts.get(id).unwrap().user_name, "alice");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let accounts = store();
        assert!(accounts.create("alice", b"pw".to_vec(), vec![]).is_some());
        assert!(accounts.create("alice", b"other".to_vec(), vec![]).is_none());
    }

    #[test]
    fn test_lookup_by_name() {
        let accounts = store();
        let id = accounts.create("bob", b"pw".to_vec(), vec![]).unwrap();
        assert_eq!(accounts.get_by_name("bob").unwrap().id, id);
        assert!(accounts.get_by_name("carol").is_none());
    }

    #[test]
    fn test_profile_updates() {
        let accounts = store();
        let id = accounts.create("alice", b"pw".to_vec(), vec![]).unwrap();
        assert!(accounts.set_player_name(id, "Knight"));
        assert!(accounts.set_email(id, "a@example.com"));
        assert!(accounts.set_user_data(id, vec![1, 2, 3]));

        let account = accounts.get(id).unwrap();
        assert_eq!(account.player_name, "Knight");
        assert_eq!(account.email, "a@example.com");
        assert_eq!(account.user_data, vec![1, 2, 3]);

        assert!(!accounts.set_player_name(999, "Nobody"));
    }

    #[test]
    fn test_user_name_stripped() {
        let account = Account {
            id: 2,
            user_name: "alice#1234".into(),
            player_name: String::new(),
            email: String::new(),
            password: vec![],
            cd_key: vec![],
            user_data: vec![],
        };
        assert_eq!(account.user_name_stripped(), "alice");
    }
}
