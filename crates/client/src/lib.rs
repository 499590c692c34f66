//! # Chatbot Client Library
//!
//! Terminal chat client for the newline-delimited chatbot protocol.
//!
//! ## Overview
//!
//! The client connects to a server, shows the banner it sends, then loops:
//! read a message from the console, send it, wait for exactly one reply and
//! show it with a timestamp. A reply of `"exit"` ends the session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use client::console::{LineInput, TerminalOutput};
//! use client::session::{connect, SessionOptions};
//! use protocol::Endpoint;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let endpoint = Endpoint::default();
//!     let session = connect(&endpoint, None, SessionOptions::default()).await?;
//!
//!     let mut input = LineInput::stdin();
//!     let mut output = TerminalOutput::stdout();
//!     let summary = session.run(&mut input, &mut output).await;
//!     println!("{} turns", summary.turns);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`console`]: Console input/output and display texts
//! - [`session`]: The session engine
//! - [`clock`]: Reply timestamps

pub mod clock;
pub mod config;
pub mod console;
pub mod session;

// Re-export protocol for convenience
pub use protocol;

pub use config::Config;
pub use session::{
    connect, ConnectionError, Session, SessionEnd, SessionOptions, SessionState, SessionSummary,
};
