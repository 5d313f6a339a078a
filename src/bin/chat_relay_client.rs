//! Chat Relay Client - Entry Point
//!
//! Prompts for an identifier, connects, and runs the duplex loop over
//! stdin/stdout. Diagnostics go to stderr.

use std::env;

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use chat_relay::client::connect;
use chat_relay::config::DEFAULT_ADDR;
use chat_relay::{run_duplex, ClientExit};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_relay=warn")),
        )
        .init();

    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    // Connect failure ends the client
    let stream = connect(&addr).await?;

    let mut stdin = BufReader::new(io::stdin());
    let mut stdout = io::stdout();

    stdout.write_all(b"Enter your user ID: ").await?;
    stdout.flush().await?;
    let mut identifier = String::new();
    stdin.read_line(&mut identifier).await?;

    stdout.write_all(b"Welcome to the chat\n").await?;
    stdout.flush().await?;

    let exit = run_duplex(stream, identifier.trim(), stdin, io::stdout()).await?;
    match exit.farewell() {
        Some(notice) if exit == ClientExit::ServerClosed => eprintln!("{}", notice),
        Some(notice) => println!("{}", notice),
        None => {}
    }

    // A pending stdin read would keep the runtime from shutting down.
    if exit.abandons_input() {
        std::process::exit(0);
    }

    Ok(())
}
