//! Shared registries: game servers, observers and id allocation.

pub mod observers;
pub mod servers;

pub use observers::{ObserverRegistry, OnlineRegistry};
pub use servers::{GameServer, JoinError, ServerRegistry, UpdateError};

use parking_lot::Mutex;

/// Globally unique id source shared by the account store and the server
/// registry. Pre-increments, so the first allocated id is 2.
pub struct IdAllocator {
    next: Mutex<u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: Mutex::new(1) }
    }

    pub fn alloc(&self) -> u32 {
        let mut next = self.next.lock();
        *next += 1;
        *next
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
