//! Protocol message definitions.
//!
//! The protocol has no envelope: outbound messages are bare lines typed by
//! the user, and every inbound reply is either the termination sentinel or
//! free text to show.

use std::fmt;

use crate::error::{ProtocolError, Result};

/// Reply line that ends the session. Matched exactly and case-sensitively.
pub const SENTINEL: &str = "exit";

/// A validated outbound chat message.
///
/// Construction rejects input that is blank after trimming, so an empty
/// message can never reach the wire. The text itself is sent unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message(String);

impl Message {
    /// Validate user input as an outbound message.
    ///
    /// A single trailing line terminator is stripped first.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let mut text = raw.into();
        if text.ends_with('\n') {
            text.pop();
            if text.ends_with('\r') {
                text.pop();
            }
        }

        if text.trim().is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }
        if text.contains('\n') {
            return Err(ProtocolError::EmbeddedNewline);
        }

        Ok(Self(text))
    }

    /// The message text, without terminator.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reply line from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The termination sentinel.
    Exit,
    /// Any other line, including empty ones.
    Text(String),
}

impl Reply {
    /// Classify a received line (terminator already stripped).
    pub fn parse(line: impl Into<String>) -> Self {
        let line = line.into();
        if line == SENTINEL {
            Reply::Exit
        } else {
            Reply::Text(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_accepts_text() {
        let message = Message::new("hello").unwrap();
        assert_eq!(message.as_str(), "hello");
    }

    #[test]
    fn test_message_keeps_surrounding_whitespace() {
        let message = Message::new("  spaced out  ").unwrap();
        assert_eq!(message.as_str(), "  spaced out  ");
    }

    #[test]
    fn test_message_strips_terminator() {
        assert_eq!(Message::new("hi\n").unwrap().as_str(), "hi");
        assert_eq!(Message::new("hi\r\n").unwrap().as_str(), "hi");
    }

    #[test]
    fn test_message_rejects_blank_input() {
        for raw in ["", " ", "\t", "   \n", "\r\n"] {
            assert!(
                matches!(Message::new(raw), Err(ProtocolError::EmptyMessage)),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_message_rejects_embedded_newline() {
        assert!(matches!(
            Message::new("one\ntwo"),
            Err(ProtocolError::EmbeddedNewline)
        ));
    }

    #[test]
    fn test_message_may_be_sentinel_text() {
        // Only replies are checked against the sentinel.
        assert_eq!(Message::new("exit").unwrap().to_string(), "exit");
    }

    #[test]
    fn test_reply_sentinel_is_exact() {
        assert_eq!(Reply::parse("exit"), Reply::Exit);
        assert_eq!(Reply::parse(SENTINEL), Reply::Exit);

        for line in ["Exit", "EXIT", " exit", "exit ", "exit!", "", "exiting"] {
            assert_eq!(Reply::parse(line), Reply::Text(line.to_string()));
        }
    }
}
