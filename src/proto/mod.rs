//! Wire protocol: low-level codec and the typed message catalogue.

pub mod payloads;
pub mod wire;

pub use payloads::{encode, AppMessage, AppPayload, PayloadKind};
pub use wire::{DecodeError, PayloadPrefix, PayloadReader, PayloadWriter, CHAT_MAGIC, PAYLOAD_MAGIC};
