//! Client-side duplex loop
//!
//! Sends the identifier, then runs a sender over local input and a
//! receiver that copies every server line to local output verbatim.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::RelayError;

/// Input line that ends the session after being sent
pub const EXIT_COMMAND: &str = "exit";

/// Why the duplex loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// The user typed the exit command (it was still sent)
    ExitCommand,
    /// Local input reached end of file
    InputClosed,
    /// The server closed the connection or a read failed
    ServerClosed,
}

impl ClientExit {
    /// Line shown to the user once the loop stops, if any
    pub fn farewell(self) -> Option<&'static str> {
        match self {
            ClientExit::ExitCommand => Some("Goodbye"),
            ClientExit::InputClosed => None,
            ClientExit::ServerClosed => Some("Disconnected from server"),
        }
    }

    /// Whether an input read may still be outstanding
    ///
    /// Only the server side can end the loop while the sender is waiting on
    /// input. A blocking stdin read cannot be cancelled, so the caller has
    /// to end the process instead of returning.
    pub fn abandons_input(self) -> bool {
        matches!(self, ClientExit::ServerClosed)
    }
}

/// Connect to the relay at `addr`
pub async fn connect(addr: &str) -> Result<TcpStream, RelayError> {
    TcpStream::connect(addr)
        .await
        .map_err(|source| RelayError::Connect {
            addr: addr.to_string(),
            source,
        })
}

/// Run one chat session over `stream`
///
/// The identifier is sent first without waiting for any acknowledgment.
/// Returns when the user exits, input ends, or the server goes away.
pub async fn run_duplex<I, O>(
    stream: TcpStream,
    identifier: &str,
    mut input: I,
    output: O,
) -> Result<ClientExit, RelayError>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, mut write_half) = stream.into_split();

    write_half.write_all(identifier.as_bytes()).await?;
    write_half.write_all(b"\n").await?;

    let mut receiver = tokio::spawn(receive_lines(BufReader::new(read_half), output));

    let exit = tokio::select! {
        res = send_lines(&mut input, &mut write_half) => res?,
        res = &mut receiver => {
            if let Ok(Err(e)) = res {
                debug!("Receiver stopped: {}", e);
            }
            return Ok(ClientExit::ServerClosed);
        }
    };

    receiver.abort();
    Ok(exit)
}

async fn send_lines<I, W>(input: &mut I, writer: &mut W) -> Result<ClientExit, RelayError>
where
    I: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(text) = lines.next_line().await? {
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        if text == EXIT_COMMAND {
            return Ok(ClientExit::ExitCommand);
        }
    }
    Ok(ClientExit::InputClosed)
}

async fn receive_lines<R, O>(reader: R, mut output: O) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(())
}
