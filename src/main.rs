//! Chat Relay Server - Entry Point
//!
//! Binds the listener, starts the broadcast router, and accepts
//! connections until the process is interrupted.

use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::{RelayConfig, RelayServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    // Listen address from the first argument, CHAT_RELAY_ADDR, or the default
    let config = RelayConfig::from_env()?;

    let server = RelayServer::bind(config).await?;
    info!("Chat relay listening on {}", server.local_addr()?);

    tokio::select! {
        _ = server.run() => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
