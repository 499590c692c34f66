//! Console collaborators for the session engine.
//!
//! Input and output are passed into the engine explicitly. The terminal
//! implementations wrap stdin/stdout; [`CapturedOutput`] records everything
//! shown so tests can assert on the transcript.

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use protocol::{parse_port, Endpoint};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::warn;

/// Prefix for informational status lines.
pub const PREF_INF: &str = "[INFO] ";

/// Prefix for error status lines.
pub const PREF_ERR: &str = "[ERROR] ";

/// Label shown before reading each outbound message.
pub const MESSAGE_PROMPT: &str = "Message: ";

/// Source of user-typed lines.
#[allow(async_fn_in_trait)]
pub trait ConsoleInput {
    /// Read one line without its terminator.
    ///
    /// Returns `None` once the input is exhausted.
    async fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Sink for display lines.
pub trait ConsoleOutput {
    /// Show a complete line.
    fn show(&mut self, line: &str);

    /// Show a label and leave the cursor after it, ready for input.
    fn prompt(&mut self, label: &str);
}

/// Line input over any buffered async reader.
pub struct LineInput<R> {
    reader: R,
}

impl<R> LineInput<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Line input over `reader`.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl LineInput<BufReader<Stdin>> {
    /// Line input from the process stdin.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> ConsoleInput for LineInput<R>
where
    R: AsyncBufRead + Unpin,
{
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut buf).await?;
        if bytes_read == 0 {
            return Ok(None);
        }

        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        }
        // Undecodable bytes become U+FFFD instead of ending the session.
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }
}

/// Output to a terminal or any other writer.
pub struct TerminalOutput<W> {
    writer: W,
}

impl<W: Write> TerminalOutput<W> {
    /// Output to `writer`, flushed after every write.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl TerminalOutput<io::Stdout> {
    /// Output to the process stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleOutput for TerminalOutput<W> {
    fn show(&mut self, line: &str) {
        if let Err(e) = writeln!(self.writer, "{}", line).and_then(|_| self.writer.flush()) {
            warn!("Failed to write to console: {}", e);
        }
    }

    fn prompt(&mut self, label: &str) {
        if let Err(e) = write!(self.writer, "{}", label).and_then(|_| self.writer.flush()) {
            warn!("Failed to write to console: {}", e);
        }
    }
}

/// One entry in a captured transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// A complete line passed to [`ConsoleOutput::show`].
    Line(String),
    /// A label passed to [`ConsoleOutput::prompt`].
    Prompt(String),
}

/// Output that records everything shown, in order.
#[derive(Debug, Default)]
pub struct CapturedOutput {
    events: Vec<ConsoleEvent>,
}

impl CapturedOutput {
    /// An empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event in the order it was produced.
    pub fn events(&self) -> &[ConsoleEvent] {
        &self.events
    }

    /// Only the complete lines, skipping prompts.
    pub fn lines(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ConsoleEvent::Line(line) => Some(line.as_str()),
                ConsoleEvent::Prompt(_) => None,
            })
            .collect()
    }

    /// Number of prompts shown.
    pub fn prompt_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, ConsoleEvent::Prompt(_)))
            .count()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl ConsoleOutput for CapturedOutput {
    fn show(&mut self, line: &str) {
        self.events.push(ConsoleEvent::Line(line.to_string()));
    }

    fn prompt(&mut self, label: &str) {
        self.events.push(ConsoleEvent::Prompt(label.to_string()));
    }
}

/// Display texts for session events.
pub mod notice {
    use std::time::Duration;

    use protocol::Endpoint;

    use super::{PREF_ERR, PREF_INF};

    pub fn connected(endpoint: &Endpoint) -> String {
        format!("{}(Client running to {})", PREF_INF, endpoint)
    }

    pub fn banner(line: &str) -> String {
        format!("Current time and date is {}", line)
    }

    pub fn reply(timestamp: &str, line: &str) -> String {
        format!("> {} | Reply from Server: {}", timestamp, line)
    }

    pub fn empty_message() -> String {
        format!("{}Message cannot be empty.", PREF_ERR)
    }

    pub fn rejected(reason: &dyn std::fmt::Display) -> String {
        format!("{}Message not sent: {}", PREF_ERR, reason)
    }

    pub fn farewell() -> &'static str {
        "Thank you for using AIChatbot! Exiting..."
    }

    pub fn empty_session() -> String {
        format!("{}Server closed the connection before greeting.", PREF_INF)
    }

    pub fn disconnected() -> String {
        format!("{}Server closed the connection unexpectedly.", PREF_ERR)
    }

    pub fn timed_out(limit: Duration) -> String {
        format!(
            "{}No reply from server within {:?}; closing session.",
            PREF_ERR, limit
        )
    }

    pub fn input_closed() -> String {
        format!("{}Input closed; ending session.", PREF_INF)
    }

    pub fn failed(reason: &dyn std::fmt::Display) -> String {
        format!("{}Connection error: {}", PREF_ERR, reason)
    }

    pub fn connect_failed(reason: &dyn std::fmt::Display) -> String {
        format!("{}{}", PREF_ERR, reason)
    }
}

/// Clear the terminal and move the cursor home.
pub fn clear_screen() -> io::Result<()> {
    execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0))
}

/// Ask for the remote address and port on the console.
///
/// An empty answer keeps the default; an invalid answer is reported and asked
/// again. Returns `None` if the input ends before both values are given.
pub async fn prompt_endpoint<I, O>(
    input: &mut I,
    output: &mut O,
    default: &Endpoint,
) -> io::Result<Option<Endpoint>>
where
    I: ConsoleInput,
    O: ConsoleOutput,
{
    let host = loop {
        output.prompt(&format!("Address [{}]: ", default.host()));
        let Some(answer) = input.read_line().await? else {
            return Ok(None);
        };
        let answer = answer.trim();
        if answer.is_empty() {
            break default.host().to_string();
        }
        match Endpoint::new(answer, default.port()) {
            Ok(endpoint) => break endpoint.host().to_string(),
            Err(e) => output.show(&format!("{}{}", PREF_ERR, e)),
        }
    };

    loop {
        output.prompt(&format!("Port [{}]: ", default.port()));
        let Some(answer) = input.read_line().await? else {
            return Ok(None);
        };
        let answer = answer.trim();
        let port = if answer.is_empty() {
            Ok(default.port())
        } else {
            parse_port(answer)
        };
        match port.and_then(|port| Endpoint::new(&host, port)) {
            Ok(endpoint) => return Ok(Some(endpoint)),
            Err(e) => output.show(&format!("{}{}", PREF_ERR, e)),
        }
    }
}
