//! Session engine: one chat session against one remote endpoint.
//!
//! A session moves through three states:
//!
//! ```text
//! Handshaking --(banner line)----------------------> Exchanging
//! Handshaking --(end of stream)--------------------> Closed
//! Exchanging  --(sentinel reply)-------------------> Closed
//! Exchanging  --(end of stream, I/O error)---------> Closed
//! Exchanging  --(reply timeout, console closed)----> Closed
//! Exchanging  --(empty input)----------------------> Exchanging  [nothing sent]
//! Exchanging  --(any other reply)------------------> Exchanging
//! ```
//!
//! Turns strictly alternate: a message is sent, then exactly one reply is
//! read, before the user is prompted again.

use std::fmt;
use std::io;
use std::time::Duration;

use protocol::{Endpoint, LineChannel, Message, ProtocolError, Reply};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::console::{notice, ConsoleInput, ConsoleOutput, MESSAGE_PROMPT};

/// Failure to open the channel to the remote endpoint.
#[derive(Debug, Error)]
#[error("Could not connect to {endpoint}: {source}")]
pub struct ConnectionError {
    /// The endpoint that could not be reached.
    pub endpoint: Endpoint,
    /// The underlying cause.
    #[source]
    pub source: io::Error,
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the server banner.
    Handshaking,
    /// Exchanging messages and replies.
    Exchanging,
    /// Channel closed; no further transitions.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Handshaking => "handshaking",
            SessionState::Exchanging => "exchanging",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why a session reached [`SessionState::Closed`].
#[derive(Debug)]
pub enum SessionEnd {
    /// The server replied with the sentinel.
    Sentinel,
    /// The server closed the stream before sending a banner.
    EmptySession,
    /// The server closed the stream while a reply was expected.
    Disconnected,
    /// The console input was exhausted.
    InputClosed,
    /// No reply arrived within the configured deadline.
    TimedOut(Duration),
    /// An I/O or protocol error on the channel.
    Failed(ProtocolError),
}

impl SessionEnd {
    /// Whether the session ended the way the protocol intends.
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            SessionEnd::Sentinel | SessionEnd::EmptySession | SessionEnd::InputClosed
        )
    }
}

/// Outcome of a finished session.
#[derive(Debug)]
pub struct SessionSummary {
    /// The banner line, if one was received.
    pub banner: Option<String>,
    /// Number of completed turns (message sent and reply received).
    pub turns: usize,
    /// Why the session ended.
    pub end: SessionEnd,
    /// State after the session finished; always [`SessionState::Closed`].
    pub state: SessionState,
}

/// Tunables for a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Deadline for each reply; `None` waits forever.
    pub reply_timeout: Option<Duration>,
}

/// Open a TCP connection to `endpoint`.
///
/// Names are resolved by the runtime. With a `timeout`, a connection attempt
/// that does not complete in time fails with [`io::ErrorKind::TimedOut`].
pub async fn connect(
    endpoint: &Endpoint,
    timeout: Option<Duration>,
    options: SessionOptions,
) -> Result<Session<TcpStream>, ConnectionError> {
    let fail = |source: io::Error| ConnectionError {
        endpoint: endpoint.clone(),
        source,
    };

    debug!("Connecting to {}", endpoint);
    let connect_future = TcpStream::connect((endpoint.host(), endpoint.port()));
    let stream = match timeout {
        Some(limit) => tokio::time::timeout(limit, connect_future)
            .await
            .map_err(|_| fail(io::Error::new(io::ErrorKind::TimedOut, "connection timed out")))?,
        None => connect_future.await,
    }
    .map_err(fail)?;

    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to disable Nagle's algorithm: {}", e);
    }

    info!("Connected to {}", endpoint);
    Ok(Session::new(stream, endpoint.clone(), options))
}

/// One chat session over an exclusively owned channel.
pub struct Session<S> {
    channel: LineChannel<S>,
    endpoint: Endpoint,
    state: SessionState,
    options: SessionOptions,
    clock: Box<dyn Clock>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Start a session over an already connected stream.
    pub fn new(stream: S, endpoint: Endpoint, options: SessionOptions) -> Self {
        Self {
            channel: LineChannel::new(stream),
            endpoint,
            state: SessionState::Handshaking,
            options,
            clock: Box::new(SystemClock),
        }
    }

    /// Replace the clock used for reply timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// The remote endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Drive the session to completion and close the channel.
    ///
    /// The session is consumed, so the channel is closed exactly once.
    pub async fn run<I, O>(mut self, input: &mut I, output: &mut O) -> SessionSummary
    where
        I: ConsoleInput,
        O: ConsoleOutput,
    {
        output.show(&notice::connected(&self.endpoint));
        output.show("");

        let mut summary = SessionSummary {
            banner: None,
            turns: 0,
            end: SessionEnd::EmptySession,
            state: self.state,
        };
        let end = self.drive(input, output, &mut summary).await;
        summary.end = end;

        match &summary.end {
            SessionEnd::Sentinel => output.show(notice::farewell()),
            SessionEnd::EmptySession => output.show(&notice::empty_session()),
            SessionEnd::Disconnected => output.show(&notice::disconnected()),
            SessionEnd::InputClosed => output.show(&notice::input_closed()),
            SessionEnd::TimedOut(limit) => output.show(&notice::timed_out(*limit)),
            SessionEnd::Failed(e) => output.show(&notice::failed(e)),
        }

        info!(
            endpoint = %self.endpoint,
            turns = summary.turns,
            "Session ended: {:?}",
            summary.end
        );
        summary.state = self.close().await;
        summary
    }

    async fn drive<I, O>(
        &mut self,
        input: &mut I,
        output: &mut O,
        summary: &mut SessionSummary,
    ) -> SessionEnd
    where
        I: ConsoleInput,
        O: ConsoleOutput,
    {
        match self.channel.read_line().await {
            Ok(Some(banner)) => {
                debug!("Received banner: {}", banner);
                output.show(&notice::banner(&banner));
                summary.banner = Some(banner);
            }
            Ok(None) => return SessionEnd::EmptySession,
            Err(e) => return SessionEnd::Failed(e),
        }
        self.transition(SessionState::Exchanging);

        loop {
            output.show("");
            output.prompt(MESSAGE_PROMPT);

            let raw = match input.read_line().await {
                Ok(Some(raw)) => raw,
                Ok(None) => return SessionEnd::InputClosed,
                Err(e) => return SessionEnd::Failed(e.into()),
            };

            let message = match Message::new(raw) {
                Ok(message) => message,
                Err(ProtocolError::EmptyMessage) => {
                    debug!("Rejected empty message");
                    output.show(&notice::empty_message());
                    continue;
                }
                Err(e) => {
                    output.show(&notice::rejected(&e));
                    continue;
                }
            };

            if let Err(e) = self.channel.write_line(message.as_str()).await {
                return self.end_on_error(e);
            }
            debug!(bytes = message.as_str().len(), "Sent message");

            let line = match self.read_reply().await {
                Ok(Some(line)) => line,
                Ok(None) => return SessionEnd::Disconnected,
                Err(e) => return self.end_on_error(e),
            };
            summary.turns += 1;

            match Reply::parse(line) {
                Reply::Exit => {
                    debug!("Received sentinel");
                    return SessionEnd::Sentinel;
                }
                Reply::Text(text) => {
                    output.show("");
                    output.show(&notice::reply(&self.clock.timestamp(), &text));
                }
            }
        }
    }

    async fn read_reply(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.options.reply_timeout {
            Some(limit) => tokio::time::timeout(limit, self.channel.read_line())
                .await
                .map_err(|_| ProtocolError::Timeout(format!("no reply within {:?}", limit)))?,
            None => self.channel.read_line().await,
        }
    }

    fn end_on_error(&self, error: ProtocolError) -> SessionEnd {
        match (&error, self.options.reply_timeout) {
            (ProtocolError::Timeout(_), Some(limit)) => SessionEnd::TimedOut(limit),
            (e, _) if e.is_disconnect() => SessionEnd::Disconnected,
            _ => SessionEnd::Failed(error),
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state: {} -> {}", self.state, next);
        self.state = next;
    }

    async fn close(mut self) -> SessionState {
        self.transition(SessionState::Closed);
        if let Err(e) = self.channel.shutdown().await {
            debug!("Channel shutdown reported: {}", e);
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::console::{CapturedOutput, ConsoleEvent, LineInput};
    use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

    const STAMP: &str = "Mon Jan 01 00:00:00 UTC 2024";

    fn session(stream: tokio::io::DuplexStream) -> Session<tokio::io::DuplexStream> {
        Session::new(stream, Endpoint::default(), SessionOptions::default())
            .with_clock(FixedClock::new(STAMP))
    }

    #[tokio::test]
    async fn test_new_session_is_handshaking() {
        let (client, _server) = duplex(64);
        let session = session(client);
        assert_eq!(session.state, SessionState::Handshaking);
        assert_eq!(session.endpoint(), &Endpoint::default());
    }

    #[tokio::test]
    async fn test_eof_before_banner_is_empty_session() {
        let (client, server) = duplex(64);
        drop(server);

        let mut input = LineInput::new(&b"hello\n"[..]);
        let mut output = CapturedOutput::new();
        let summary = session(client).run(&mut input, &mut output).await;

        assert!(matches!(summary.end, SessionEnd::EmptySession));
        assert_eq!(summary.state, SessionState::Closed);
        assert!(summary.banner.is_none());
        assert_eq!(summary.turns, 0);
        assert_eq!(output.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_sentinel_reply_closes_session() {
        let (client, server) = duplex(1024);
        let peer = tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut reader = BufReader::new(read_half);
            write_half.write_all(b"banner\n").await.unwrap();

            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            assert_eq!(line, "exit\n");
            write_half.write_all(b"exit\n").await.unwrap();
        });

        let mut input = LineInput::new(&b"exit\n"[..]);
        let mut output = CapturedOutput::new();
        let summary = session(client).run(&mut input, &mut output).await;

        peer.await.unwrap();
        assert!(matches!(summary.end, SessionEnd::Sentinel));
        assert!(summary.end.is_clean());
        assert_eq!(summary.state, SessionState::Closed);
        assert_eq!(summary.turns, 1);
        assert_eq!(output.lines().last(), Some(&notice::farewell()));
    }

    #[tokio::test]
    async fn test_non_sentinel_reply_keeps_session_open() {
        let (client, server) = duplex(1024);
        let peer = tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut reader = BufReader::new(read_half);
            write_half.write_all(b"banner\n").await.unwrap();

            for reply in ["EXIT", "exit ", ""] {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                write_half
                    .write_all(format!("{}\n", reply).as_bytes())
                    .await
                    .unwrap();
            }
        });

        let mut input = LineInput::new(&b"a\nb\nc\n"[..]);
        let mut output = CapturedOutput::new();
        let summary = session(client).run(&mut input, &mut output).await;

        peer.await.unwrap();
        assert_eq!(summary.turns, 3);
        assert!(matches!(summary.end, SessionEnd::InputClosed));
        assert!(output.contains(&notice::reply(STAMP, "EXIT")));
        assert!(output.contains(&notice::reply(STAMP, "exit ")));
    }

    #[tokio::test]
    async fn test_empty_input_writes_nothing() {
        let (client, mut server) = duplex(1024);
        server.write_all(b"banner\n").await.unwrap();

        let mut input = LineInput::new(&b"\n   \n\t\n"[..]);
        let mut output = CapturedOutput::new();
        let summary = session(client).run(&mut input, &mut output).await;

        assert!(matches!(summary.end, SessionEnd::InputClosed));
        assert_eq!(summary.turns, 0);
        // Three rejections plus the final prompt that hit end of input.
        assert_eq!(output.prompt_count(), 4);
        assert_eq!(
            output
                .lines()
                .iter()
                .filter(|line| line.contains("cannot be empty"))
                .count(),
            3
        );

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_eof_on_reply_is_disconnected_not_sentinel() {
        let (client, server) = duplex(1024);
        let peer = tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut reader = BufReader::new(read_half);
            write_half.write_all(b"banner\n").await.unwrap();

            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            // Close without replying.
        });

        let mut input = LineInput::new(&b"hello\nnever sent\n"[..]);
        let mut output = CapturedOutput::new();
        let summary = session(client).run(&mut input, &mut output).await;

        peer.await.unwrap();
        assert!(matches!(summary.end, SessionEnd::Disconnected));
        assert!(!summary.end.is_clean());
        assert_eq!(summary.turns, 0);
        assert!(!output.contains(notice::farewell()));
        assert!(output.contains("unexpectedly"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_timeout() {
        let (client, mut server) = duplex(1024);
        server.write_all(b"banner\n").await.unwrap();

        let options = SessionOptions {
            reply_timeout: Some(Duration::from_secs(5)),
        };
        let session = Session::new(client, Endpoint::default(), options);

        let mut input = LineInput::new(&b"anyone there?\n"[..]);
        let mut output = CapturedOutput::new();
        let summary = session.run(&mut input, &mut output).await;

        assert!(matches!(summary.end, SessionEnd::TimedOut(d) if d == Duration::from_secs(5)));
        assert!(output.contains("within 5s"));
        assert_eq!(summary.state, SessionState::Closed);
        drop(server);
    }

    #[tokio::test]
    async fn test_invalid_utf8_input_is_sent_lossily() {
        let (client, server) = duplex(1024);
        let peer = tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut reader = BufReader::new(read_half);
            write_half.write_all(b"banner\n").await.unwrap();

            let mut received = Vec::new();
            for _ in 0..2 {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                received.push(line);
                write_half.write_all(b"ok\n").await.unwrap();
            }
            received
        });

        let mut input = LineInput::new(&b"caf\xff\nhello\n"[..]);
        let mut output = CapturedOutput::new();
        let summary = session(client).run(&mut input, &mut output).await;

        let received = peer.await.unwrap();
        assert_eq!(received, vec!["caf\u{FFFD}\n", "hello\n"]);
        assert!(matches!(summary.end, SessionEnd::InputClosed));
        assert_eq!(summary.turns, 2);
    }

    #[tokio::test]
    async fn test_prompt_follows_each_reply() {
        let (client, server) = duplex(1024);
        let peer = tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut reader = BufReader::new(read_half);
            write_half.write_all(b"banner\n").await.unwrap();

            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            write_half.write_all(b"pong\n").await.unwrap();
        });

        let mut input = LineInput::new(&b"ping\n"[..]);
        let mut output = CapturedOutput::new();
        session(client).run(&mut input, &mut output).await;
        peer.await.unwrap();

        let reply = ConsoleEvent::Line(notice::reply(STAMP, "pong"));
        let events = output.events();
        let reply_at = events.iter().position(|e| e == &reply).unwrap();
        let prompts: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, ConsoleEvent::Prompt(_)))
            .map(|(i, _)| i)
            .collect();

        assert_eq!(prompts.len(), 2);
        assert!(prompts[0] < reply_at && reply_at < prompts[1]);
    }

    #[tokio::test]
    async fn test_oversized_reply_fails_session() {
        let (client, server) = duplex(1024);
        let peer = tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut reader = BufReader::new(read_half);
            write_half.write_all(b"banner\n").await.unwrap();

            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let huge = "x".repeat(protocol::MAX_LINE_LENGTH + 10);
            // The client stops reading once the limit is hit.
            let _ = write_half.write_all(huge.as_bytes()).await;
        });

        let mut input = LineInput::new(&b"hello\n"[..]);
        let mut output = CapturedOutput::new();
        let summary = session(client).run(&mut input, &mut output).await;
        peer.await.unwrap();

        assert!(matches!(
            summary.end,
            SessionEnd::Failed(ProtocolError::LineTooLong { .. })
        ));
        assert!(output.contains("line too long"));
    }
}
