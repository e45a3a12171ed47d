//! CAT Dialect Library
//!
//! This crate provides framing, decoding and value translation for the
//! wire dialects spoken by third-party station software:
//!
//! - **Narrow CAT**: Kenwood-style 2-letter commands, 1-character mode codes
//! - **Wide CAT**: vendor "ZZ" 4-letter commands, 2-character mode codes
//! - **OTRSP**: keyword commands for two-radio switching
//! - **WinKeyer**: binary keyer protocol with opcode/parameter framing
//!
//! # Architecture
//!
//! Everything here is synchronous and free of I/O:
//! - Streaming codecs accumulate bytes and yield complete frames
//! - Static tables translate modes, filter presets, AGC codes and SO2R prefixes
//! - The status-word codec keeps the narrow and wide transceiver records in step
//! - The WinKeyer decoder is a resumable state machine that reports side effects
//!
//! # Example
//!
//! ```rust
//! use cat_protocol::{CatCodec, ProtocolCodec};
//!
//! let mut codec = CatCodec::new();
//! codec.push_bytes(b"FA0001425");
//! assert!(codec.next_command().is_none());
//!
//! codec.push_bytes(b"0000;MD3;");
//! assert_eq!(codec.next_command().unwrap().as_str(), "FA00014250000;");
//! assert_eq!(codec.next_command().unwrap().as_str(), "MD3;");
//! ```

pub mod agc;
pub mod error;
pub mod filter;
pub mod frame;
pub mod mode;
pub mod otrsp;
pub mod so2r;
pub mod status_word;
pub mod winkeyer;

pub use agc::AgcMode;
pub use error::{ParseError, TranslationError};
pub use filter::{CutEdge, FilterContext, Passband};
pub use frame::{CatCodec, CatFrame};
pub use mode::{DemodMode, ModeSelection};
pub use otrsp::{OtrspAction, OtrspCodec, OtrspCommand, RxRouting};
pub use status_word::{StatusProperty, StatusRecord, StatusSnapshot, StatusWordPair};
pub use winkeyer::{WinKeyerDecoder, WinKeyerEvent};

/// Identifies which CAT text dialect a command or record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dialect {
    /// Kenwood-style 2-letter commands (`FA`, `MD`, `IF`)
    Narrow,
    /// Vendor 4-letter commands starting with `ZZ` (`ZZFA`, `ZZMD`, `ZZIF`)
    Wide,
}

impl Dialect {
    /// Returns a human-readable name for the dialect
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Narrow => "Kenwood",
            Dialect::Wide => "ZZ",
        }
    }

    /// Classify a command prefix
    pub fn of_prefix(prefix: &str) -> Self {
        if prefix.len() == 4 && prefix.starts_with("ZZ") {
            Dialect::Wide
        } else {
            Dialect::Narrow
        }
    }
}

/// Trait for protocol codecs that can parse incoming data streams
pub trait ProtocolCodec {
    /// The command type produced by this codec
    type Command;

    /// Push raw bytes into the codec's buffer
    fn push_bytes(&mut self, data: &[u8]);

    /// Try to extract the next complete command from the buffer
    fn next_command(&mut self) -> Option<Self::Command> {
        self.next_command_with_bytes().map(|(cmd, _)| cmd)
    }

    /// Try to extract the next complete command along with its raw bytes
    fn next_command_with_bytes(&mut self) -> Option<(Self::Command, Vec<u8>)>;

    /// Clear the internal buffer
    fn clear(&mut self);
}
