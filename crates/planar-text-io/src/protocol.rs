//! Carriage-return line framing.
//!
//! Planar displays speak line-oriented ASCII: every command and every
//! response is terminated by a single `\r`. Some firmware also emits a `\n`
//! after the CR, which ends up at the head of the next frame; it is trimmed.

use tracing::{trace, warn};

/// The carriage-return byte that terminates every command and response.
pub const TERMINATOR: u8 = b'\r';

/// Maximum unterminated bytes held before the framer resets.
/// Responses are well under 64 bytes; 8192 is generous headroom.
pub const MAX_BUF: usize = 8192;

/// Result of attempting to decode one line from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete, non-empty line was decoded.
    Line {
        /// Line text without the terminator.
        text: String,
        /// Number of bytes consumed from the input buffer.
        consumed: usize,
    },

    /// A terminator with nothing (or only line feeds) before it.
    Empty(usize),

    /// A terminated frame that is not valid UTF-8.
    Invalid(usize),

    /// No terminator yet. More data is needed.
    Incomplete,
}

/// Decode one CR-terminated line from the front of `buf`.
pub fn decode_line(buf: &[u8]) -> DecodeResult {
    let Some(term_pos) = buf.iter().position(|&b| b == TERMINATOR) else {
        return DecodeResult::Incomplete;
    };

    let consumed = term_pos + 1;
    let body = trim_line_feeds(&buf[..term_pos]);
    if body.is_empty() {
        return DecodeResult::Empty(consumed);
    }

    match std::str::from_utf8(body) {
        Ok(text) => DecodeResult::Line {
            text: text.to_string(),
            consumed,
        },
        Err(_) => DecodeResult::Invalid(consumed),
    }
}

fn trim_line_feeds(mut body: &[u8]) -> &[u8] {
    while let [b'\n', rest @ ..] = body {
        body = rest;
    }
    while let [rest @ .., b'\n'] = body {
        body = rest;
    }
    body
}

/// Append the terminator to a command.
///
/// ```
/// use planar_text_io::protocol::encode_command;
///
/// assert_eq!(encode_command("SYSTEM.STATE?"), b"SYSTEM.STATE?\r".to_vec());
/// ```
pub fn encode_command(cmd: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(cmd.len() + 1);
    bytes.extend_from_slice(cmd.as_bytes());
    bytes.push(TERMINATOR);
    bytes
}

/// Stateful splitter from a byte stream into complete lines.
///
/// Bytes after the last terminator are retained until the rest of their
/// line arrives. Partial lines are never emitted.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every line they complete, in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(data);

        let mut lines = Vec::new();
        loop {
            match decode_line(&self.buf) {
                DecodeResult::Line { text, consumed } => {
                    self.buf.drain(..consumed);
                    lines.push(text);
                }
                DecodeResult::Empty(consumed) => {
                    trace!("dropping empty line");
                    self.buf.drain(..consumed);
                }
                DecodeResult::Invalid(consumed) => {
                    warn!(len = consumed, "dropping non-UTF-8 line");
                    self.buf.drain(..consumed);
                }
                DecodeResult::Incomplete => break,
            }
        }

        if self.buf.len() > MAX_BUF {
            warn!(len = self.buf.len(), "line buffer overflow, resetting");
            self.buf.clear();
        }

        lines
    }

    /// Number of buffered bytes still waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
