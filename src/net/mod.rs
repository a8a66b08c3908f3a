//! Transport layer: framing, outbound delivery and the TCP accept loop.

pub mod framing;
pub mod sink;
pub mod transport;

pub use sink::{ChannelSink, ConnectionSink};
pub use transport::LobbyServer;
