//! Newline-delimited text channel.
//!
//! # Line Format
//!
//! Every message on the wire is UTF-8 text followed by `\n`. A trailing
//! `\r` before the newline is tolerated on input and stripped. There is no
//! length prefix; inbound lines longer than the configured maximum are
//! rejected with [`ProtocolError::LineTooLong`].
//!
//! Writes are flushed immediately so each line reaches the peer as a
//! discrete unit.

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};
use tracing::trace;

use crate::error::{ProtocolError, Result};

/// Maximum inbound line length (64 KiB), excluding the terminator.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A duplex text channel speaking one message per line.
///
/// The channel owns both halves of the underlying stream. Calling
/// [`LineChannel::shutdown`] consumes it, so a channel can only be closed once.
pub struct LineChannel<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    max_line_length: usize,
}

impl<S> LineChannel<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            max_line_length: MAX_LINE_LENGTH,
        }
    }

    /// Override the maximum inbound line length.
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// The maximum inbound line length in bytes.
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Read the next line from the peer.
    ///
    /// Returns `None` when the peer has closed the stream before sending any
    /// further bytes. A final line without a terminator is returned as-is.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        // Room for the longest allowed line plus "\r\n".
        let limit = self.max_line_length as u64 + 2;
        let mut buf = Vec::new();

        let bytes_read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await?;

        if bytes_read == 0 {
            trace!("line channel reached end of stream");
            return Ok(None);
        }

        let terminated = buf.last() == Some(&b'\n');
        if !terminated && bytes_read as u64 == limit {
            return Err(ProtocolError::LineTooLong {
                size: bytes_read,
                max: self.max_line_length,
            });
        }

        if terminated {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }

        if buf.len() > self.max_line_length {
            return Err(ProtocolError::LineTooLong {
                size: buf.len(),
                max: self.max_line_length,
            });
        }

        let line = String::from_utf8_lossy(&buf).into_owned();
        trace!(bytes = bytes_read, "received line");
        Ok(Some(line))
    }

    /// Send one line to the peer and flush it.
    ///
    /// The terminator is appended here; `line` must not contain one.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        if line.contains('\n') {
            return Err(ProtocolError::EmbeddedNewline);
        }

        let mut data = String::with_capacity(line.len() + 1);
        data.push_str(line);
        data.push('\n');

        self.writer.write_all(data.as_bytes()).await?;
        self.writer.flush().await?;

        trace!(bytes = data.len(), "sent line");
        Ok(())
    }

    /// Shut down the write side and release the stream.
    pub async fn shutdown(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
