//! Relay configuration
//!
//! Listen address from the command line or environment, plus the write
//! timeout that detaches a client which stops reading.

use std::env;
use std::time::Duration;

use crate::error::RelayError;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:5555";

/// Upper bound on one socket write to a peer
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest write timeout accepted from the environment
pub const MAX_WRITE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

const ADDR_VAR: &str = "CHAT_RELAY_ADDR";
const WRITE_TIMEOUT_VAR: &str = "CHAT_RELAY_WRITE_TIMEOUT_MS";

/// Server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the listener binds to
    pub listen_addr: String,
    /// Timeout applied to each write to a peer
    pub write_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_ADDR.to_string(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl RelayConfig {
    /// Build the config from process arguments and environment
    ///
    /// The first argument, if any, is the listen address and wins over
    /// `CHAT_RELAY_ADDR`.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::resolve(env::args().nth(1), |key| env::var(key).ok())
    }

    /// Build the config from an optional address and a variable lookup
    pub fn resolve<F>(addr_arg: Option<String>, lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = addr_arg.or_else(|| lookup(ADDR_VAR)) {
            config.listen_addr = addr;
        }
        if let Some(raw) = lookup(WRITE_TIMEOUT_VAR) {
            let max_ms = MAX_WRITE_TIMEOUT.as_millis() as u64;
            config.write_timeout =
                Duration::from_millis(parse_bounded(WRITE_TIMEOUT_VAR, &raw, max_ms)?);
        }

        Ok(config)
    }
}

/// Parse a value in `1..=max`
fn parse_bounded(key: &'static str, raw: &str, max: u64) -> Result<u64, RelayError> {
    match raw.trim().parse::<u64>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n),
        _ => Err(RelayError::InvalidConfig {
            key,
            value: raw.to_string(),
        }),
    }
}
