//! Command descriptor table
//!
//! Every client command prefix maps to a [`CommandDescriptor`] that names the
//! canonical [`Property`] it reads or writes and the shape of its suffix. The
//! table is built in and can be replaced wholesale from a JSON file.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, ValidationError};

/// Canonical property a command addresses
///
/// Properties ending in a digit belong to that slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    AutoInfo,
    Freq0,
    Freq1,
    ActiveRx,
    ActiveTx,
    StatusNarrow0,
    StatusNarrow1,
    StatusWide0,
    StatusWide1,
    ModeNarrow0,
    ModeWide0,
    ModeWide1,
    RitOn0,
    RitOn1,
    XitOn0,
    RitClear,
    XitClear,
    RitUp,
    RitDown,
    RitOffset0,
    RitOffset1,
    Transmit,
    Receive,
    Mox,
    AfGain0,
    AfGain1,
    CwSpeed,
    CwSend,
    LowCut0,
    HighCut0,
    FilterPreset0,
    FilterPreset1,
    AgcNarrow0,
    AgcWide0,
    RfPower,
    Identity,
    PowerOn,
    TuneStep0,
    AudioMute0,
    AudioMute1,
    AudioPan0,
    AudioPan1,
    Interlock,
}

impl Property {
    /// Slice this property belongs to, if it is per-slice
    pub fn slice(&self) -> Option<usize> {
        use Property::*;
        match self {
            Freq0 | StatusNarrow0 | StatusWide0 | ModeNarrow0 | ModeWide0 | RitOn0 | XitOn0
            | RitClear | XitClear | RitUp | RitDown | RitOffset0 | AfGain0 | LowCut0
            | HighCut0 | FilterPreset0 | AgcNarrow0 | AgcWide0 | TuneStep0 | AudioMute0
            | AudioPan0 => Some(0),
            Freq1 | StatusNarrow1 | StatusWide1 | ModeWide1 | RitOn1 | RitOffset1 | AfGain1
            | FilterPreset1 | AudioMute1 | AudioPan1 => Some(1),
            _ => None,
        }
    }

    /// Resolve the radio index digit of an indexed command
    pub fn indexed(self, index: usize) -> Option<Self> {
        use Property::*;
        match (self, index) {
            (p, 0) => Some(p),
            (AfGain0, 1) => Some(AfGain1),
            (Freq0, 1) => Some(Freq1),
            (RitOn0, 1) => Some(RitOn1),
            (RitOffset0, 1) => Some(RitOffset1),
            (FilterPreset0, 1) => Some(FilterPreset1),
            (AudioMute0, 1) => Some(AudioMute1),
            (AudioPan0, 1) => Some(AudioPan1),
            _ => None,
        }
    }

    /// Audio mute property of a slice
    pub fn audio_mute(slice: usize) -> Self {
        if slice == 0 {
            Property::AudioMute0
        } else {
            Property::AudioMute1
        }
    }

    /// Audio pan property of a slice
    pub fn audio_pan(slice: usize) -> Self {
        if slice == 0 {
            Property::AudioPan0
        } else {
            Property::AudioPan1
        }
    }
}

/// How a get reply value is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Formatter {
    /// Left-pad with `0` to the answer length
    #[default]
    LeadingZeros,
    /// Sign, then the magnitude padded to answer length minus one
    Polarity,
    /// Value as is
    Text,
}

/// Shape and target of one command prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub prefix: String,
    pub property: Property,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub write_only: bool,
    /// Digits of radio index between prefix and suffix
    #[serde(default)]
    pub index_length: usize,
    /// Suffix length of the get form
    #[serde(default)]
    pub get_length: usize,
    /// Suffix length of the set form
    #[serde(default)]
    pub set_length: usize,
    #[serde(default)]
    pub answer_length: usize,
    /// Inclusive bounds of a numeric suffix; `None` skips the range check
    #[serde(default)]
    pub range: Option<(i64, i64)>,
    #[serde(default)]
    pub formatter: Formatter,
}

impl CommandDescriptor {
    /// Read/write descriptor with no suffix in either form
    pub fn new(prefix: &str, property: Property) -> Self {
        Self {
            prefix: prefix.to_string(),
            property,
            read_only: false,
            write_only: false,
            index_length: 0,
            get_length: 0,
            set_length: 0,
            answer_length: 0,
            range: None,
            formatter: Formatter::LeadingZeros,
        }
    }

    /// Fixed-width numeric value within `min..=max`
    pub fn digits(mut self, length: usize, min: i64, max: i64) -> Self {
        self.set_length = length;
        self.answer_length = length;
        self.range = Some((min, max));
        self
    }

    /// Fixed-width numeric value without range check
    pub fn unbounded(mut self, length: usize) -> Self {
        self.set_length = length;
        self.answer_length = length;
        self.range = None;
        self
    }

    /// Signed value; `length` includes the sign
    pub fn signed(mut self, length: usize, min: i64, max: i64) -> Self {
        self = self.digits(length, min, max);
        self.formatter = Formatter::Polarity;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self.set_length = 0;
        self.formatter = Formatter::Text;
        self
    }

    /// Write-only with the given suffix length (zero for bare commands)
    pub fn write_only(mut self, set_length: usize) -> Self {
        self.write_only = true;
        self.set_length = set_length;
        self
    }

    pub fn indexed(mut self, length: usize) -> Self {
        self.index_length = length;
        self
    }

    /// Free text suffix, only checked for a minimum command length
    pub fn text(mut self) -> Self {
        self.formatter = Formatter::Text;
        self
    }

    /// Check a parsed command against this descriptor
    pub fn validate(&self, index: &str, suffix: &str) -> Result<(), ValidationError> {
        let length = self.prefix.len() + index.len() + suffix.len();
        if self.formatter == Formatter::Text && !self.read_only {
            if length < 3 {
                return Err(self.invalid_length(length));
            }
            return Ok(());
        }

        if index.len() != self.index_length
            || (suffix.len() != self.get_length && suffix.len() != self.set_length)
        {
            return Err(self.invalid_length(length));
        }
        if !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::NotNumeric {
                prefix: self.prefix.clone(),
                value: index.to_string(),
            });
        }
        if suffix.is_empty() {
            return Ok(());
        }

        let value: i64 = suffix.parse().map_err(|_| ValidationError::NotNumeric {
            prefix: self.prefix.clone(),
            value: suffix.to_string(),
        })?;
        if let Some((min, max)) = self.range {
            if value < min || value > max {
                return Err(ValidationError::OutOfRange {
                    prefix: self.prefix.clone(),
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Render a canonical value for a get reply
    pub fn format(&self, value: &str) -> String {
        match self.formatter {
            Formatter::LeadingZeros => format!("{:0>width$}", value, width = self.answer_length),
            Formatter::Polarity => {
                let (sign, magnitude) = match value.strip_prefix('-') {
                    Some(m) => ('-', m),
                    None => ('+', value.trim_start_matches('+')),
                };
                format!(
                    "{}{:0>width$}",
                    sign,
                    magnitude,
                    width = self.answer_length.saturating_sub(1)
                )
            }
            Formatter::Text => value.to_string(),
        }
    }

    fn invalid_length(&self, length: usize) -> ValidationError {
        ValidationError::InvalidLength {
            prefix: self.prefix.clone(),
            length,
        }
    }
}

/// Prefix → descriptor lookup
#[derive(Debug, Clone)]
pub struct DescriptorTable {
    by_prefix: HashMap<String, CommandDescriptor>,
}

impl DescriptorTable {
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = CommandDescriptor>) -> Self {
        Self {
            by_prefix: descriptors
                .into_iter()
                .map(|d| (d.prefix.to_ascii_uppercase(), d))
                .collect(),
        }
    }

    /// Parse a JSON array of descriptors
    pub fn from_json(json: &str) -> Result<Self, GatewayError> {
        let descriptors: Vec<CommandDescriptor> = serde_json::from_str(json)?;
        Ok(Self::from_descriptors(descriptors))
    }

    /// Load a JSON descriptor file
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize the table as a JSON array sorted by prefix
    pub fn to_json(&self) -> Result<String, GatewayError> {
        let mut descriptors: Vec<&CommandDescriptor> = self.by_prefix.values().collect();
        descriptors.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        Ok(serde_json::to_string_pretty(&descriptors)?)
    }

    pub fn get(&self, prefix: &str) -> Option<&CommandDescriptor> {
        self.by_prefix.get(prefix)
    }

    pub fn len(&self) -> usize {
        self.by_prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_prefix.is_empty()
    }

    /// The built-in table
    pub fn builtin() -> Self {
        use CommandDescriptor as D;
        use Property::*;

        Self::from_descriptors([
            D::new("AI", AutoInfo).digits(1, 0, 4),
            D::new("ZZAI", AutoInfo).digits(1, 0, 1),
            // Frequencies
            D::new("FA", Freq0).unbounded(11),
            D::new("ZZFA", Freq0).unbounded(11),
            D::new("FB", Freq1).unbounded(11),
            D::new("ZZFB", Freq1).unbounded(11),
            D::new("FR", ActiveRx).digits(1, 0, 1),
            D::new("ZZFR", ActiveRx).digits(1, 0, 1),
            D::new("FT", ActiveTx).digits(1, 0, 1),
            D::new("ZZFT", ActiveTx).digits(1, 0, 1),
            // Status words
            D::new("IF", StatusNarrow0).read_only(),
            D::new("IX", StatusNarrow1).read_only(),
            D::new("ZZIF", StatusWide0).read_only(),
            D::new("ZZIX", StatusWide1).read_only(),
            // Modes
            D::new("MD", ModeNarrow0).digits(1, 1, 9),
            D::new("ZZMD", ModeWide0).digits(2, 0, 99),
            D::new("ZZME", ModeWide1).digits(2, 0, 99),
            // RIT / XIT
            D::new("RT", RitOn0).digits(1, 0, 1),
            D::new("ZZRT", RitOn0).digits(1, 0, 1),
            D::new("ZZRY", RitOn1).digits(1, 0, 1),
            D::new("XT", XitOn0).digits(1, 0, 1),
            D::new("ZZXS", XitOn0).digits(1, 0, 1),
            D::new("RC", RitClear).write_only(0),
            D::new("ZZRC", RitClear).write_only(0),
            D::new("XC", XitClear).write_only(0),
            D::new("RU", RitUp).write_only(5).digits(5, 0, 99999),
            D::new("RD", RitDown).write_only(5).digits(5, 0, 99999),
            D::new("ZZRF", RitOffset0).signed(6, -99999, 99999),
            D::new("ZZRW", RitOffset1).signed(6, -99999, 99999),
            // Transmit
            D::new("TX", Transmit).write_only(1).digits(1, 0, 2),
            D::new("RX", Receive).write_only(0),
            D::new("ZZTX", Mox).digits(1, 0, 1),
            // Audio
            D::new("AG", AfGain0).indexed(1).digits(3, 0, 100),
            D::new("ZZAG", AfGain0).digits(3, 0, 100),
            D::new("ZZLE", AfGain1).digits(3, 0, 100),
            // CW
            D::new("KS", CwSpeed).digits(3, 4, 100),
            D::new("ZZCS", CwSpeed).digits(2, 1, 60),
            D::new("KY", CwSend).write_only(0).text(),
            // Filters and AGC
            D::new("SL", LowCut0).digits(2, 0, 11),
            D::new("SH", HighCut0).digits(2, 0, 11),
            D::new("ZZFI", FilterPreset0).digits(2, 0, 7),
            D::new("ZZFJ", FilterPreset1).digits(2, 0, 7),
            D::new("GT", AgcNarrow0).digits(3, 0, 4),
            D::new("ZZGT", AgcWide0).digits(1, 0, 4),
            // Radio
            D::new("PC", RfPower).digits(3, 0, 100),
            D::new("ZZPC", RfPower).digits(3, 0, 100),
            D::new("ZZTS", TuneStep0).digits(5, 1, 99999),
            D::new("ID", Identity).read_only(),
            D::new("PS", PowerOn).digits(1, 0, 1),
        ])
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::builtin()
    }
}
