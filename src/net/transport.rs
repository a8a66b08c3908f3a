//! TCP accept loop
//!
//! One reader task per connection plus a writer task draining that
//! connection's outbound channel. All protocol work happens in the handler
//! layer; this file only moves frames.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::handler::{self, LobbyState};
use crate::net::framing::{read_frame, write_frame, FramingError};
use crate::net::sink::ChannelSink;
use crate::session::Session;

pub struct LobbyServer {
    state: Arc<LobbyState>,
    sink: Arc<ChannelSink>,
    next_conn: AtomicU32,
}

impl LobbyServer {
    pub fn new(state: Arc<LobbyState>, sink: Arc<ChannelSink>) -> Self {
        Self {
            state,
            sink,
            next_conn: AtomicU32::new(1),
        }
    }

    /// Bind and serve until the process is shut down.
    pub async fn run(self: Arc<Self>) -> std::io::Result<()> {
        let addr = (self.state.config.bind_address, self.state.config.port);
        let listener = TcpListener::bind(addr).await?;
        info!(address = %listener.local_addr()?, "lobby server listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
            debug!(conn, %peer, "connection accepted");

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                server.serve_connection(conn, stream).await;
            });
        }
    }

    async fn serve_connection(&self, conn: u32, stream: TcpStream) {
        let (mut reader, mut writer) = stream.into_split();

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.sink.register(conn, tx);

        let writer_task = tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                if let Err(err) = write_frame(&mut writer, &bytes).await {
                    debug!(%err, "outbound write failed, closing writer");
                    break;
                }
            }
        });

        let mut session = Session::new(conn);
        loop {
            match read_frame(&mut reader).await {
                Ok(frame) => handler::handle_frame(&self.state, &mut session, &frame),
                Err(FramingError::ConnectionClosed) => {
                    debug!(conn, "connection closed by peer");
                    break;
                }
                Err(err) => {
                    warn!(conn, %err, "read failed, dropping connection");
                    break;
                }
            }
        }

        handler::handle_close(&self.state, &mut session);
        self.sink.unregister(conn);
        writer_task.abort();
    }
}
