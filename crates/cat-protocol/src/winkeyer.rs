//! WinKeyer host protocol decoder
//!
//! Contest loggers drive a WinKeyer with a byte stream in which values
//! 0x00-0x1F are command opcodes (each followed by a fixed number of
//! parameter bytes) and 0x20-0x7F is text to be keyed; higher bytes are
//! reported and dropped, so every keyed byte is echoed once. The decoder is
//! resumable: a chunk may end anywhere, including between an opcode and its
//! parameters, and decoding continues with the next chunk.
//!
//! The decoder performs no I/O. [`WinKeyerDecoder::feed`] returns the side
//! effects of the bytes it consumed, in order, for the port driver to carry
//! out.

use std::collections::VecDeque;

/// Status byte: keyer idle, buffer empty
pub const STATUS_READY: u8 = 0xC0;

/// Status byte: keyer busy sending
pub const STATUS_BUSY: u8 = 0xC4;

/// Firmware version reported on host open
pub const VERSION: u8 = 0x0A;

/// Admin command prefix
pub const OP_ADMIN: u8 = 0x00;
/// Set sidetone frequency
pub const OP_SIDETONE: u8 = 0x01;
/// Set keying speed in WPM
pub const OP_SPEED: u8 = 0x02;
/// Request speed pot value
pub const OP_GET_SPEED_POT: u8 = 0x07;
/// Clear the send buffer
pub const OP_CLEAR_BUFFER: u8 = 0x0A;
/// Request keyer status
pub const OP_STATUS: u8 = 0x15;
/// Buffer pointer (canned message) commands
pub const OP_POINTER: u8 = 0x16;

const ADMIN_HOST_OPEN: u8 = 0x02;
const ADMIN_HOST_CLOSE: u8 = 0x03;

/// Parameter bytes following each opcode (admin and pointer are special-cased)
const PARAM_COUNTS: [u8; 32] = [
    0, 1, 1, 1, 2, 3, 1, 0, // 0x00-0x07
    0, 1, 0, 1, 1, 1, 1, 1, // 0x08-0x0F
    1, 1, 1, 0, 1, 0, 1, 1, // 0x10-0x17
    1, 1, 1, 2, 1, 1, 0, 0, // 0x18-0x1F
];

/// Sidetone codes 1-10 in Hz
const SIDETONE_HZ: [u16; 10] = [4000, 2000, 1500, 1000, 800, 650, 600, 500, 450, 400];

/// A side effect produced by decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WinKeyerEvent {
    /// Bytes to write back out the port
    Reply(Vec<u8>),
    /// Host opened the keyer
    HostOpen,
    /// Host closed the keyer
    HostClose,
    /// Keying speed in WPM
    SetSpeed(u8),
    /// Sidetone (CW pitch) in Hz
    SetSidetone(u16),
    /// Text to key, in order
    Transmit(String),
    /// Abort keying and discard queued text
    ClearBuffer,
    /// Recognized opcode with no gateway counterpart
    Ignored { opcode: u8, params: Vec<u8> },
    /// Byte sequence that cannot be decoded; the decoder is back in idle
    DecodeError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Admin,
    AwaitingParams { opcode: u8, remaining: u8 },
    Pointer,
    PointerArg { sub: u8 },
}

/// Resumable WinKeyer decoder for one port
#[derive(Debug)]
pub struct WinKeyerDecoder {
    state: State,
    params: Vec<u8>,
    pending_output: Vec<u8>,
    pending_echo: VecDeque<u8>,
    speed: u8,
    canned_message: bool,
}

impl WinKeyerDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            params: Vec::with_capacity(3),
            pending_output: Vec::new(),
            pending_echo: VecDeque::new(),
            speed: 0,
            canned_message: false,
        }
    }

    /// Last speed set by the host
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Seed the speed reported to speed-pot requests
    pub fn set_speed(&mut self, wpm: u8) {
        self.speed = wpm;
    }

    /// True once the host has used a buffer pointer command
    pub fn canned_message_detected(&self) -> bool {
        self.canned_message
    }

    /// True while keyed characters have not all been echoed
    pub fn is_sending(&self) -> bool {
        !self.pending_echo.is_empty()
    }

    /// True when no opcode is partially received
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Decode a chunk of bytes from the host
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<WinKeyerEvent> {
        let mut events = Vec::new();
        for &b in bytes {
            self.step(b, &mut events);
        }

        if self.state == State::Idle && !self.pending_output.is_empty() {
            self.pending_echo.extend(self.pending_output.iter().copied());
            let text: String = self.pending_output.drain(..).map(char::from).collect();
            events.push(WinKeyerEvent::Transmit(text));
        }
        events
    }

    /// The keyer sent one character; returns the bytes to echo to the host
    pub fn char_sent(&mut self) -> Vec<u8> {
        let Some(c) = self.pending_echo.pop_front() else {
            return Vec::new();
        };
        let mut out = vec![STATUS_BUSY, c];
        if self.pending_echo.is_empty() {
            out.push(STATUS_READY);
        }
        out
    }

    /// Drop queued and unechoed text; returns the status bytes to write
    ///
    /// Used for both the clear-buffer opcode and the keyer's own erase
    /// notification, so it is safe to call repeatedly.
    pub fn reset_buffers(&mut self) -> Vec<u8> {
        self.pending_output.clear();
        self.pending_echo.clear();
        vec![STATUS_READY]
    }

    fn step(&mut self, b: u8, events: &mut Vec<WinKeyerEvent>) {
        match self.state {
            State::Idle => self.start(b, events),
            State::Admin => {
                self.state = State::Idle;
                match b {
                    ADMIN_HOST_OPEN => {
                        events.push(WinKeyerEvent::Reply(vec![VERSION]));
                        events.push(WinKeyerEvent::HostOpen);
                    }
                    ADMIN_HOST_CLOSE => events.push(WinKeyerEvent::HostClose),
                    sub if sub <= 0x1F => events.push(WinKeyerEvent::Ignored {
                        opcode: OP_ADMIN,
                        params: vec![sub],
                    }),
                    other => events.push(WinKeyerEvent::DecodeError(format!(
                        "invalid admin command 0x{:02X}",
                        other
                    ))),
                }
            }
            State::AwaitingParams { opcode, remaining } => {
                self.params.push(b);
                if remaining > 1 {
                    self.state = State::AwaitingParams {
                        opcode,
                        remaining: remaining - 1,
                    };
                } else {
                    self.state = State::Idle;
                    let params = std::mem::take(&mut self.params);
                    self.execute(opcode, params, events);
                }
            }
            State::Pointer => match b {
                0x00 => {
                    self.state = State::Idle;
                    self.canned_message = true;
                    events.push(WinKeyerEvent::Ignored {
                        opcode: OP_POINTER,
                        params: vec![b],
                    });
                }
                0x01..=0x03 => self.state = State::PointerArg { sub: b },
                other => {
                    self.state = State::Idle;
                    events.push(WinKeyerEvent::DecodeError(format!(
                        "invalid pointer command 0x{:02X}",
                        other
                    )));
                }
            },
            State::PointerArg { sub } => {
                self.state = State::Idle;
                self.canned_message = true;
                events.push(WinKeyerEvent::Ignored {
                    opcode: OP_POINTER,
                    params: vec![sub, b],
                });
            }
        }
    }

    fn start(&mut self, b: u8, events: &mut Vec<WinKeyerEvent>) {
        match b {
            OP_ADMIN => self.state = State::Admin,
            OP_POINTER => self.state = State::Pointer,
            0x01..=0x1F => match PARAM_COUNTS[b as usize] {
                0 => self.execute(b, Vec::new(), events),
                n => {
                    self.params.clear();
                    self.state = State::AwaitingParams {
                        opcode: b,
                        remaining: n,
                    };
                }
            },
            0x20..=0x7F => self.pending_output.push(b),
            other => events.push(WinKeyerEvent::DecodeError(format!(
                "non-ASCII byte 0x{:02X} dropped",
                other
            ))),
        }
    }

    fn execute(&mut self, opcode: u8, params: Vec<u8>, events: &mut Vec<WinKeyerEvent>) {
        match opcode {
            OP_SIDETONE => {
                let code = params.first().copied().unwrap_or(0) & 0x0F;
                match SIDETONE_HZ.get((code as usize).wrapping_sub(1)) {
                    Some(&hz) => events.push(WinKeyerEvent::SetSidetone(hz)),
                    None => events.push(WinKeyerEvent::Ignored { opcode, params }),
                }
            }
            OP_SPEED => {
                self.speed = params.first().copied().unwrap_or(self.speed);
                events.push(WinKeyerEvent::SetSpeed(self.speed));
            }
            OP_GET_SPEED_POT => events.push(WinKeyerEvent::Reply(vec![self.speed | 0x80])),
            OP_CLEAR_BUFFER => {
                events.push(WinKeyerEvent::ClearBuffer);
                let ready = self.reset_buffers();
                events.push(WinKeyerEvent::Reply(ready));
            }
            OP_STATUS => {
                let status = if self.is_sending() {
                    STATUS_BUSY
                } else {
                    STATUS_READY
                };
                events.push(WinKeyerEvent::Reply(vec![status]));
            }
            _ => events.push(WinKeyerEvent::Ignored { opcode, params }),
        }
    }
}

impl Default for WinKeyerDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_open_replies_version() {
        let mut dec = WinKeyerDecoder::new();
        let events = dec.feed(&[0x00, 0x02]);
        assert_eq!(
            events,
            vec![WinKeyerEvent::Reply(vec![VERSION]), WinKeyerEvent::HostOpen]
        );
    }

    #[test]
    fn test_set_speed_no_reply() {
        let mut dec = WinKeyerDecoder::new();
        let events = dec.feed(&[0x02, 0x14]);
        assert_eq!(events, vec![WinKeyerEvent::SetSpeed(20)]);
        assert_eq!(dec.speed(), 20);
    }

    #[test]
    fn test_params_span_chunks() {
        let mut dec = WinKeyerDecoder::new();
        assert!(dec.feed(&[0x05, 0x0A]).is_empty());
        assert!(!dec.is_idle());
        assert!(dec.feed(&[0x28]).is_empty());
        let events = dec.feed(&[0x00]);
        assert_eq!(
            events,
            vec![WinKeyerEvent::Ignored {
                opcode: 0x05,
                params: vec![0x0A, 0x28, 0x00]
            }]
        );
        assert!(dec.is_idle());
    }

    #[test]
    fn test_text_transmitted_when_idle() {
        let mut dec = WinKeyerDecoder::new();
        let events = dec.feed(b"CQ TEST");
        assert_eq!(events, vec![WinKeyerEvent::Transmit("CQ TEST".into())]);
        assert!(dec.is_sending());
    }

    #[test]
    fn test_text_held_while_params_pending() {
        let mut dec = WinKeyerDecoder::new();
        assert!(dec.feed(b"AB\x04\x01").is_empty());
        let events = dec.feed(&[0x02]);
        assert_eq!(events[1], WinKeyerEvent::Transmit("AB".into()));
    }

    #[test]
    fn test_echo_sequence() {
        let mut dec = WinKeyerDecoder::new();
        dec.feed(b"5NN");
        assert_eq!(dec.char_sent(), vec![STATUS_BUSY, b'5']);
        assert_eq!(dec.char_sent(), vec![STATUS_BUSY, b'N']);
        assert_eq!(dec.char_sent(), vec![STATUS_BUSY, b'N', STATUS_READY]);
        assert!(dec.char_sent().is_empty());
        assert!(!dec.is_sending());
    }

    #[test]
    fn test_clear_buffer_is_idempotent() {
        let mut dec = WinKeyerDecoder::new();
        dec.feed(b"TEST");
        let events = dec.feed(&[OP_CLEAR_BUFFER]);
        assert_eq!(
            events,
            vec![
                WinKeyerEvent::ClearBuffer,
                WinKeyerEvent::Reply(vec![STATUS_READY])
            ]
        );
        assert!(!dec.is_sending());
        assert_eq!(dec.reset_buffers(), vec![STATUS_READY]);
        assert_eq!(dec.reset_buffers(), vec![STATUS_READY]);
    }

    #[test]
    fn test_status_reflects_sending() {
        let mut dec = WinKeyerDecoder::new();
        assert_eq!(dec.feed(&[OP_STATUS]), vec![WinKeyerEvent::Reply(vec![STATUS_READY])]);
        dec.feed(b"K");
        assert_eq!(dec.feed(&[OP_STATUS]), vec![WinKeyerEvent::Reply(vec![STATUS_BUSY])]);
    }

    #[test]
    fn test_speed_pot_reply() {
        let mut dec = WinKeyerDecoder::new();
        dec.feed(&[OP_SPEED, 25]);
        assert_eq!(dec.feed(&[OP_GET_SPEED_POT]), vec![WinKeyerEvent::Reply(vec![25 | 0x80])]);
    }

    #[test]
    fn test_pointer_sets_canned_flag() {
        let mut dec = WinKeyerDecoder::new();
        dec.feed(&[OP_POINTER, 0x01]);
        assert!(!dec.canned_message_detected());
        dec.feed(&[0x10]);
        assert!(dec.canned_message_detected());
        assert!(dec.is_idle());
    }

    #[test]
    fn test_bad_admin_resets() {
        let mut dec = WinKeyerDecoder::new();
        let events = dec.feed(&[0x00, 0x41]);
        assert!(matches!(events[0], WinKeyerEvent::DecodeError(_)));
        assert!(dec.is_idle());
    }

    #[test]
    fn test_non_ascii_text_dropped() {
        let mut dec = WinKeyerDecoder::new();
        let events = dec.feed(&[b'T', 0xE9, b'U']);
        assert!(matches!(events[0], WinKeyerEvent::DecodeError(_)));
        assert_eq!(events[1], WinKeyerEvent::Transmit("TU".into()));
        assert_eq!(dec.char_sent(), vec![STATUS_BUSY, b'T']);
        assert_eq!(dec.char_sent(), vec![STATUS_BUSY, b'U', STATUS_READY]);
        assert!(!dec.is_sending());
    }

    #[test]
    fn test_sidetone() {
        let mut dec = WinKeyerDecoder::new();
        assert_eq!(dec.feed(&[OP_SIDETONE, 0x07]), vec![WinKeyerEvent::SetSidetone(600)]);
    }
}
