//! # Chatbot Protocol Library
//!
//! Wire-level building blocks for the newline-delimited chatbot protocol.
//!
//! ## Overview
//!
//! The protocol is plain text over a stream socket:
//!
//! 1. Right after the connection opens, the server sends one **banner** line
//!    (usually its current date and time).
//! 2. The client then sends one message per line and reads exactly one reply
//!    line back before sending the next one.
//! 3. A reply equal to [`SENTINEL`] (`"exit"`) ends the session.
//!
//! ```text
//! client                          server
//!   │ ─────────── connect ─────────▶ │
//!   │ ◀──────── banner line ──────── │
//!   │ ────────── message ──────────▶ │
//!   │ ◀─────────── reply ─────────── │
//!   │             ...                │
//!   │ ◀─────────── "exit" ────────── │
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Endpoint, Message, Reply};
//!
//! let endpoint = Endpoint::new("127.0.0.1", 6013).unwrap();
//! assert_eq!(endpoint.port(), 6013);
//!
//! assert!(Message::new("   ").is_err());
//! assert_eq!(Reply::parse("exit"), Reply::Exit);
//! ```
//!
//! ## Modules
//!
//! - [`endpoint`]: Host/port validation
//! - [`line`]: Newline-delimited duplex channel
//! - [`messages`]: Outbound messages and reply classification
//! - [`error`]: Error types

pub mod endpoint;
pub mod error;
pub mod line;
pub mod messages;

pub use endpoint::{parse_port, Endpoint, EndpointError, DEFAULT_HOST, DEFAULT_PORT};
pub use error::{ProtocolError, Result};
pub use line::{LineChannel, MAX_LINE_LENGTH};
pub use messages::{Message, Reply, SENTINEL};
