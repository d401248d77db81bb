//! Length-prefixed JSON-RPC framing over the server's stdio.
//!
//! Frames are `Content-Length: N\r\n\r\n{json}`. [`MessageReader`] parses the
//! header block and reads exactly `N` body bytes; [`MessageWriter`] serializes
//! a value and prepends the header.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single frame body, to keep a misbehaving server from
/// driving unbounded allocation.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Reads framed JSON-RPC messages from an async byte stream.
pub struct MessageReader<R> {
    input: BufReader<R>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: BufReader::new(input),
        }
    }

    /// Read the next message, or `Ok(None)` on clean end of stream.
    pub async fn next_message(&mut self) -> Result<Option<serde_json::Value>> {
        let body_len = match self.read_content_length().await? {
            Some(len) => len,
            None => return Ok(None),
        };

        if body_len > MAX_BODY_BYTES {
            bail!("frame body of {body_len} bytes exceeds the {MAX_BODY_BYTES} byte limit");
        }

        let mut body = vec![0u8; body_len];
        self.input
            .read_exact(&mut body)
            .await
            .context("reading message body")?;

        let message = serde_json::from_slice(&body).context("parsing message body")?;
        Ok(Some(message))
    }

    /// Consume the header block and return the declared body length.
    ///
    /// `Ok(None)` only when the stream ends before any header byte; end of
    /// stream inside a header block is an error.
    async fn read_content_length(&mut self) -> Result<Option<usize>> {
        let mut declared: Option<usize> = None;
        let mut in_headers = false;
        let mut line = String::new();

        loop {
            line.clear();
            let read = self
                .input
                .read_line(&mut line)
                .await
                .context("reading frame header")?;
            if read == 0 {
                if in_headers {
                    bail!("stream closed inside a frame header block");
                }
                return Ok(None);
            }
            in_headers = true;

            let header = line.trim_end();
            if header.is_empty() {
                break;
            }
            // Header names are matched case-insensitively; anything other
            // than Content-Length (e.g. Content-Type) is skipped.
            if let Some(value) = header_value(header, "Content-Length") {
                declared = Some(
                    value
                        .trim()
                        .parse()
                        .context("invalid Content-Length value")?,
                );
            }
        }

        match declared {
            Some(len) => Ok(Some(len)),
            None => bail!("frame is missing a Content-Length header"),
        }
    }
}

fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    if key.trim().eq_ignore_ascii_case(name) {
        Some(value)
    } else {
        None
    }
}

/// Writes framed JSON-RPC messages to an async byte stream.
pub struct MessageWriter<W> {
    output: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    /// Serialize `message` and write it as a single frame.
    pub async fn send(&mut self, message: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_string(message).context("serializing message")?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        self.output
            .write_all(header.as_bytes())
            .await
            .context("writing frame header")?;
        self.output
            .write_all(body.as_bytes())
            .await
            .context("writing frame body")?;
        self.output.flush().await.context("flushing frame")?;
        Ok(())
    }
}
