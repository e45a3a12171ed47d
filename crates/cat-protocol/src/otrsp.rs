//! OTRSP (Open Two Radio Switching Protocol) commands
//!
//! OTRSP commands are short keyword strings such as `RX1S` or `TX2`, with an
//! optional leading `?` marking a query. There is no hard terminator: the
//! codec emits a command as soon as the longest match at the front of the
//! buffer is available, and treats CR/LF as separators.

use crate::ProtocolCodec;

/// Maximum keyword length
const MAX_KEYWORD_LEN: usize = 4;

/// Maximum buffered bytes before stale input is dropped
const MAX_BUFFER_LEN: usize = 256;

/// A parsed OTRSP command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtrspCommand {
    /// Command was prefixed with `?`
    pub query: bool,
    /// 2-4 uppercase letters (`RX`, `TX`, `AUX`)
    pub keyword: String,
    /// Everything after the keyword (`1S`, `2`, `10`)
    pub value: String,
}

/// Headphone routing selected by an `RX` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxRouting {
    /// Slice index that receives keyboard focus
    pub active_rx: u8,
    pub mute: [bool; 2],
    /// Pan per slice (0 = left, 100 = right); `None` leaves it unchanged
    pub pan: [Option<u8>; 2],
}

/// What an OTRSP command asks the radio to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtrspAction {
    /// Receive focus and headphone routing
    Rx(RxRouting),
    /// Move transmit to the given slice index
    Tx(u8),
    /// Auxiliary band data, accepted and ignored
    Aux,
    /// Queries are accepted and ignored
    Query,
    /// Keyword or value not recognized
    Unknown,
}

impl OtrspCommand {
    /// Parse a complete command string
    pub fn parse(text: &str) -> Option<Self> {
        match match_command(text.as_bytes()) {
            Some((len, cmd)) if len == text.len() => Some(cmd),
            _ => None,
        }
    }

    /// Resolve the command into a radio action
    pub fn action(&self) -> OtrspAction {
        if self.query {
            return OtrspAction::Query;
        }
        match self.keyword.as_str() {
            "RX" => rx_routing(&self.value).map_or(OtrspAction::Unknown, OtrspAction::Rx),
            "TX" => match self.value.as_str() {
                "1" => OtrspAction::Tx(0),
                "2" => OtrspAction::Tx(1),
                _ => OtrspAction::Unknown,
            },
            "AUX" => OtrspAction::Aux,
            _ => OtrspAction::Unknown,
        }
    }

    /// Command text as it appeared on the wire
    pub fn to_wire(&self) -> String {
        format!(
            "{}{}{}",
            if self.query { "?" } else { "" },
            self.keyword,
            self.value
        )
    }
}

fn rx_routing(value: &str) -> Option<RxRouting> {
    let routing = |active_rx, mute, pan| RxRouting {
        active_rx,
        mute,
        pan,
    };
    let r = match value {
        "1" => routing(0, [false, true], [Some(50), None]),
        "2" => routing(1, [true, false], [None, Some(50)]),
        "1S" => routing(0, [false, false], [Some(0), Some(100)]),
        "2S" => routing(1, [false, false], [Some(0), Some(100)]),
        "1R" => routing(0, [false, false], [Some(100), Some(0)]),
        "2R" => routing(1, [false, false], [Some(100), Some(0)]),
        _ => return None,
    };
    Some(r)
}

/// Longest match of `?* [A-Z]{2,4} [0-9]* .* -* [0-9]* [A-Z]*` at the start of `buf`
fn match_command(buf: &[u8]) -> Option<(usize, OtrspCommand)> {
    let mut pos = 0;
    let skip = |pos: &mut usize, limit: usize, pred: fn(u8) -> bool| {
        let start = *pos;
        while *pos < buf.len() && *pos - start < limit && pred(buf[*pos]) {
            *pos += 1;
        }
        *pos - start
    };

    let queries = skip(&mut pos, usize::MAX, |b| b == b'?');
    let keyword_start = pos;
    if skip(&mut pos, MAX_KEYWORD_LEN, |b| b.is_ascii_uppercase()) < 2 {
        return None;
    }
    let value_start = pos;
    skip(&mut pos, usize::MAX, |b| b.is_ascii_digit());
    skip(&mut pos, usize::MAX, |b| b == b'.');
    skip(&mut pos, usize::MAX, |b| b == b'-');
    skip(&mut pos, usize::MAX, |b| b.is_ascii_digit());
    skip(&mut pos, usize::MAX, |b| b.is_ascii_uppercase());

    let text = |range: std::ops::Range<usize>| String::from_utf8_lossy(&buf[range]).into_owned();
    let cmd = OtrspCommand {
        query: queries > 0,
        keyword: text(keyword_start..value_start),
        value: text(value_start..pos),
    };
    Some((pos, cmd))
}

/// Streaming codec for OTRSP ports
pub struct OtrspCodec {
    buffer: Vec<u8>,
}

impl OtrspCodec {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(32),
        }
    }
}

impl Default for OtrspCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolCodec for OtrspCodec {
    type Command = OtrspCommand;

    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        if self.buffer.len() > MAX_BUFFER_LEN {
            let start = self.buffer.len() - MAX_BUFFER_LEN;
            self.buffer.drain(..start);
        }
    }

    fn next_command_with_bytes(&mut self) -> Option<(Self::Command, Vec<u8>)> {
        loop {
            let first = *self.buffer.first()?;
            if first == b'\r' || first == b'\n' {
                self.buffer.remove(0);
                continue;
            }
            if first != b'?' && !first.is_ascii_uppercase() {
                tracing::debug!("OTRSP: dropping stray byte 0x{:02X}", first);
                self.buffer.remove(0);
                continue;
            }

            match match_command(&self.buffer) {
                Some((len, cmd)) => {
                    let bytes: Vec<u8> = self.buffer.drain(..len).collect();
                    return Some((cmd, bytes));
                }
                None => {
                    // A lone letter or run of '?' may still grow into a command
                    let only_prefix = self
                        .buffer
                        .iter()
                        .all(|&b| b == b'?' || b.is_ascii_uppercase());
                    if only_prefix {
                        return None;
                    }
                    self.buffer.remove(0);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}
