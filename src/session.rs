//! Client session handler
//!
//! One task per accepted connection: read the identifier handshake,
//! register, relay chat lines to the broadcast router, and clean up on
//! disconnect. A second task per session drains the peer's outbox into the
//! socket so the router never writes to a socket itself.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::message::{chat_text, OutboundEvent, LINE_TERMINATOR};
use crate::peer::{Outbox, Peer};
use crate::registry::Registry;
use crate::router::EventSender;
use crate::types::ConnectionId;

/// Shared state handed to every session
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub registry: Registry,
    pub events: EventSender,
    pub write_timeout: Duration,
}

impl SessionContext {
    pub fn new(registry: Registry, events: EventSender, config: &RelayConfig) -> Self {
        Self {
            registry,
            events,
            write_timeout: config.write_timeout,
        }
    }
}

/// Registry membership of a session that finished its handshake
///
/// Dropping it unregisters the connection and announces the leave, so
/// cleanup runs exactly once on every exit path.
struct Membership {
    conn: ConnectionId,
    name: String,
    registry: Registry,
    events: EventSender,
}

impl Membership {
    fn register(ctx: &SessionContext, conn: ConnectionId, name: String, outbox: Outbox) -> Self {
        ctx.registry.register(conn, Peer::new(name.clone(), outbox));
        Self {
            conn,
            name,
            registry: ctx.registry.clone(),
            events: ctx.events.clone(),
        }
    }

    fn publish(&self, event: OutboundEvent) -> Result<(), RelayError> {
        self.events.send(event).map_err(|_| RelayError::RouterClosed)
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.registry.unregister(self.conn);
        if self.events.send(OutboundEvent::leave(&self.name)).is_err() {
            debug!("Router closed, leave of {} not announced", self.name);
        }
    }
}

/// Handle one accepted TCP connection until it disconnects
///
/// A connection that closes before sending its identifier line is dropped
/// without registering or announcing anything.
pub async fn handle_connection(stream: TcpStream, ctx: SessionContext) -> Result<(), RelayError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let conn = ConnectionId::new();

    debug!("Connection {} from {}", conn, peer_addr);

    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // Handshake
    let name = match read_frame(&mut reader).await? {
        Some(line) => line.trim().to_string(),
        None => {
            debug!("Connection {} closed before handshake", conn);
            return Ok(());
        }
    };

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let mut writer = tokio::spawn(write_outbox(write_half, outbox_rx, ctx.write_timeout));

    let membership = Membership::register(&ctx, conn, name.clone(), outbox_tx);
    info!("User {} joined from {} ({})", name, peer_addr, conn);
    membership.publish(OutboundEvent::join(conn, &name))?;

    let (result, writer_finished) = tokio::select! {
        res = relay_lines(&mut reader, &membership) => (res, false),
        res = &mut writer => (flatten(res), true),
    };

    // Unregistering drops the outbox sender, so the writer drains and stops.
    drop(membership);

    if !writer_finished {
        if let Err(e) = flatten(writer.await) {
            debug!("Writer for {} ended with: {}", name, e);
        }
    }

    info!("User {} disconnected", name);

    result
}

/// Read chat lines and publish each non-empty one
async fn relay_lines<R>(reader: &mut R, membership: &Membership) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = read_frame(reader).await? {
        let Some(text) = chat_text(&line) else {
            continue;
        };
        debug!("[{}] {}", membership.name, text);
        membership.publish(OutboundEvent::chat(membership.conn, &membership.name, text))?;
    }
    Ok(())
}

/// Read one newline-terminated line
///
/// Returns None at end of stream, including when the stream ends in the
/// middle of an unterminated line.
async fn read_frame<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 || !line.ends_with(LINE_TERMINATOR as char) {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Drain a peer's outbox into its socket
///
/// Each write is bounded by `write_timeout`; a peer that stops reading
/// ends its own writer instead of holding lines forever.
async fn write_outbox(
    write_half: OwnedWriteHalf,
    mut outbox: mpsc::UnboundedReceiver<Arc<str>>,
    write_timeout: Duration,
) -> Result<(), RelayError> {
    let mut writer = BufWriter::new(write_half);

    while let Some(line) = outbox.recv().await {
        timeout(write_timeout, write_line(&mut writer, &line))
            .await
            .map_err(|_| RelayError::WriteTimeout)??;
    }

    if let Err(e) = writer.shutdown().await {
        warn!("Failed to shut down connection: {}", e);
    }
    Ok(())
}

async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(&[LINE_TERMINATOR]).await?;
    writer.flush().await
}

fn flatten(res: Result<Result<(), RelayError>, JoinError>) -> Result<(), RelayError> {
    res.unwrap_or_else(|e| Err(RelayError::Io(io::Error::other(e))))
}
