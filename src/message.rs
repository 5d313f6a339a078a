//! Message protocol definitions
//!
//! Plain-text, newline-delimited protocol. The server formats chat lines
//! and lifecycle notices here; clients print whatever they receive.

use crate::types::ConnectionId;

/// Line terminator on the wire
pub const LINE_TERMINATOR: u8 = b'\n';

/// An event queued for the broadcast router
///
/// `exclude` names the connection that must not receive the text (the
/// sender for chat and join events). Leave events exclude nobody.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    /// Connection that must not receive this event
    pub exclude: Option<ConnectionId>,
    /// Text to deliver, without the line terminator
    pub text: String,
}

impl OutboundEvent {
    /// `> User {name} joined`, not echoed to the joiner
    pub fn join(conn: ConnectionId, name: &str) -> Self {
        Self {
            exclude: Some(conn),
            text: format!("> User {} joined", name),
        }
    }

    /// `[{name}]: {text}`, not echoed to the sender
    pub fn chat(conn: ConnectionId, name: &str, text: &str) -> Self {
        Self {
            exclude: Some(conn),
            text: format!("[{}]: {}", name, text),
        }
    }

    /// `User {name} left the chat`
    pub fn leave(name: &str) -> Self {
        Self {
            exclude: None,
            text: format!("User {} left the chat", name),
        }
    }
}

/// Trim a received line, returning None when nothing is left
pub fn chat_text(line: &str) -> Option<&str> {
    let text = line.trim();
    (!text.is_empty()).then_some(text)
}
