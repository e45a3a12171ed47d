//! Semicolon-terminated CAT framing
//!
//! Both text dialects share one framing rule: a command is everything up to
//! and including the next `;`. Carriage returns and line feeds are dropped on
//! arrival, and a bare `;` carries no command. Data after the last terminator
//! stays buffered until a later chunk completes it.

use crate::{Dialect, ProtocolCodec};

/// Command terminator
pub const TERMINATOR: u8 = b';';

/// Maximum command length (reasonable limit to prevent buffer overflow)
const MAX_COMMAND_LEN: usize = 128;

/// One complete CAT command as received, terminator included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatFrame {
    text: String,
}

impl CatFrame {
    /// Wrap command text, appending the terminator if it is missing
    pub fn new(text: impl Into<String>) -> Self {
        let mut text = text.into();
        if !text.ends_with(';') {
            text.push(';');
        }
        Self { text }
    }

    /// Full command text including the terminator
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Command text without the terminator
    pub fn body(&self) -> &str {
        self.text.strip_suffix(';').unwrap_or(&self.text)
    }

    /// Command prefix (2 letters, or 4 for `ZZ` commands)
    pub fn prefix(&self) -> &str {
        split_prefix(self.body()).0
    }

    /// Everything after the prefix
    pub fn suffix(&self) -> &str {
        split_prefix(self.body()).1
    }

    /// Dialect implied by the prefix
    pub fn dialect(&self) -> Dialect {
        Dialect::of_prefix(self.prefix())
    }

    /// Consume the frame, returning its text
    pub fn into_string(self) -> String {
        self.text
    }
}

/// Split a command body into prefix and suffix
///
/// The prefix is four characters when the body starts with `ZZ` followed by
/// two more letters, otherwise two characters. Bodies shorter than two
/// characters are all prefix.
pub fn split_prefix(body: &str) -> (&str, &str) {
    let is_alpha = |s: &str| s.bytes().all(|b| b.is_ascii_alphabetic());

    if body.starts_with("ZZ") {
        if let Some(head) = body.get(..4) {
            if is_alpha(head) {
                return (head, &body[4..]);
            }
        }
    }
    match body.get(..2) {
        Some(head) => (head, &body[2..]),
        None => (body, ""),
    }
}

/// Streaming frame extractor for the text dialects
pub struct CatCodec {
    buffer: Vec<u8>,
}

impl CatCodec {
    /// Create a new codec with an empty buffer
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_COMMAND_LEN),
        }
    }

    /// Bytes received but not yet part of a complete frame
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for CatCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolCodec for CatCodec {
    type Command = CatFrame;

    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer
            .extend(data.iter().copied().filter(|&b| b != b'\r' && b != b'\n'));

        // Prevent buffer overflow
        if self.buffer.len() > MAX_COMMAND_LEN * 4 && !self.buffer.contains(&TERMINATOR) {
            let start = self.buffer.len() - MAX_COMMAND_LEN;
            tracing::warn!("Discarding {} unterminated bytes", start);
            self.buffer.drain(..start);
        }
    }

    fn next_command_with_bytes(&mut self) -> Option<(Self::Command, Vec<u8>)> {
        loop {
            let term_pos = self.buffer.iter().position(|&b| b == TERMINATOR)?;
            let bytes: Vec<u8> = self.buffer.drain(..=term_pos).collect();

            if bytes.len() == 1 {
                continue;
            }

            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Some((CatFrame { text }, bytes));
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}
