//! Fixed-width transceiver status records
//!
//! Each slice keeps one status record per text dialect. The records share a
//! layout and differ only in the width of the mode field:
//!
//! | Field       | Width | Narrow offset | Wide offset |
//! |-------------|-------|---------------|-------------|
//! | frequency   | 11    | 0             | 0           |
//! | tune step   | 4     | 11            | 11          |
//! | RIT offset  | 6     | 15            | 15          |
//! | RIT on      | 1     | 21            | 21          |
//! | XIT on      | 1     | 22            | 22          |
//! | memory bank | 1 + 2 | 23            | 23          |
//! | MOX         | 1     | 26            | 26          |
//! | mode        | 1 / 2 | 27            | 27          |
//! | active RX   | 1     | 28            | 29          |
//! | scan        | 1     | 29            | 30          |
//! | active TX   | 1     | 30            | 31          |
//! | CTCSS       | 1     | 31            | 32          |
//! | tone        | 2     | 32            | 33          |
//! | shift       | 1     | 34            | 35          |

use crate::error::ParseError;
use crate::mode::{self, DemodMode};
use crate::Dialect;

/// Width of a narrow status record
pub const NARROW_LEN: usize = 35;

/// Width of a wide status record
pub const WIDE_LEN: usize = 36;

/// Narrow record before any radio data arrives (14.100 MHz USB)
pub const DEFAULT_NARROW: &str = "000141000001000+0000000000020000000";

/// Wide record before any radio data arrives (14.100 MHz USB)
pub const DEFAULT_WIDE: &str = "000141000001000+00000000000010000000";

const MAX_FREQUENCY: u64 = 99_999_999_999;
const MAX_STEP: u32 = 9999;
const MAX_RIT: i32 = 99_999;

/// One decoded status record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub dialect: Dialect,
    pub frequency_hz: u64,
    pub step: u16,
    pub rit_offset: i32,
    pub rit_enabled: bool,
    pub xit_enabled: bool,
    pub bank1: u8,
    pub bank2: u8,
    pub mox: bool,
    /// Mode code in this record's dialect
    pub mode: String,
    pub active_rx: u8,
    pub scan: u8,
    pub active_tx: u8,
    pub ctcss: u8,
    pub tone: u8,
    pub shift: u8,
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, width: usize) -> &'a str {
        let field = &self.text[self.pos..self.pos + width];
        self.pos += width;
        field
    }

    fn digits<T: std::str::FromStr>(&mut self, field: &'static str, width: usize) -> Result<T, ParseError> {
        let raw = self.take(width);
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(field, raw));
        }
        raw.parse().map_err(|_| invalid(field, raw))
    }

    fn flag(&mut self, field: &'static str) -> Result<bool, ParseError> {
        match self.take(1) {
            "0" => Ok(false),
            "1" => Ok(true),
            raw => Err(invalid(field, raw)),
        }
    }

    fn signed(&mut self, field: &'static str) -> Result<i32, ParseError> {
        let raw = self.take(6);
        let (sign, magnitude) = raw.split_at(1);
        if !matches!(sign, "+" | "-") || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(field, raw));
        }
        raw.parse().map_err(|_| invalid(field, raw))
    }
}

fn invalid(field: &'static str, value: &str) -> ParseError {
    ParseError::InvalidField {
        field,
        value: value.to_string(),
    }
}

fn record_len(dialect: Dialect) -> usize {
    match dialect {
        Dialect::Narrow => NARROW_LEN,
        Dialect::Wide => WIDE_LEN,
    }
}

fn mode_width(dialect: Dialect) -> usize {
    match dialect {
        Dialect::Narrow => 1,
        Dialect::Wide => 2,
    }
}

impl StatusRecord {
    /// Decode a record of the given dialect
    pub fn decode(dialect: Dialect, text: &str) -> Result<Self, ParseError> {
        let expected = record_len(dialect);
        if text.len() != expected || !text.is_ascii() {
            return Err(ParseError::InvalidLength {
                expected,
                actual: text.len(),
            });
        }

        let mut cur = Cursor { text, pos: 0 };
        Ok(Self {
            dialect,
            frequency_hz: cur.digits("frequency", 11)?,
            step: cur.digits("step", 4)?,
            rit_offset: cur.signed("rit offset")?,
            rit_enabled: cur.flag("rit")?,
            xit_enabled: cur.flag("xit")?,
            bank1: cur.digits("bank", 1)?,
            bank2: cur.digits("bank", 2)?,
            mox: cur.flag("mox")?,
            mode: cur.take(mode_width(dialect)).to_string(),
            active_rx: cur.digits("active rx", 1)?,
            scan: cur.digits("scan", 1)?,
            active_tx: cur.digits("active tx", 1)?,
            ctcss: cur.digits("ctcss", 1)?,
            tone: cur.digits("tone", 2)?,
            shift: cur.digits("shift", 1)?,
        })
    }

    /// Encode the record at its fixed width
    pub fn encode(&self) -> String {
        let sign = if self.rit_offset < 0 { '-' } else { '+' };
        format!(
            "{:011}{:04}{}{:05}{}{}{}{:02}{}{:>width$}{}{}{}{}{:02}{}",
            self.frequency_hz.min(MAX_FREQUENCY),
            self.step.min(MAX_STEP as u16),
            sign,
            self.rit_offset.unsigned_abs().min(MAX_RIT as u32),
            u8::from(self.rit_enabled),
            u8::from(self.xit_enabled),
            self.bank1 % 10,
            self.bank2 % 100,
            u8::from(self.mox),
            self.mode,
            self.active_rx % 10,
            self.scan % 10,
            self.active_tx % 10,
            self.ctcss % 10,
            self.tone % 100,
            self.shift % 10,
            width = mode_width(self.dialect),
        )
    }
}

/// Status fields a property update can address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusProperty {
    ActiveRx,
    ActiveTx,
    Frequency,
    RitOffset,
    RitEnabled,
    XitEnabled,
    Mox,
    /// Mode given as a wide code
    WideMode,
    /// Mode given as a narrow code
    NarrowMode,
    TuneStep,
}

impl StatusProperty {
    /// Look up a property by the radio's name for it (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let prop = match name.to_ascii_uppercase().as_str() {
            "ACTIVERX" => StatusProperty::ActiveRx,
            "ACTIVETX" | "TXVFO" => StatusProperty::ActiveTx,
            "FREQ" => StatusProperty::Frequency,
            "RITFREQ" => StatusProperty::RitOffset,
            "RITSTAT" => StatusProperty::RitEnabled,
            "XITSTAT" => StatusProperty::XitEnabled,
            "MOX" | "RX" | "TX" => StatusProperty::Mox,
            "DEMODMODE" | "DEMODMODE0F" => StatusProperty::WideMode,
            "DEMODMODE0K" => StatusProperty::NarrowMode,
            "TUNESTEP" => StatusProperty::TuneStep,
            _ => return None,
        };
        Some(prop)
    }
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool, ParseError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(invalid(field, value)),
    }
}

fn parse_digit(field: &'static str, value: &str) -> Result<u8, ParseError> {
    match value.parse::<u8>() {
        Ok(d) if d <= 9 => Ok(d),
        _ => Err(invalid(field, value)),
    }
}

/// Field values used to rebuild both records from canonical slice state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub frequency_hz: u64,
    pub step: u32,
    pub rit_offset: i32,
    pub rit_enabled: bool,
    pub xit_enabled: bool,
    pub mox: bool,
    pub mode: DemodMode,
    pub cw_lower: bool,
    pub active_rx: bool,
    pub active_tx: bool,
}

/// The narrow and wide records of one slice, always updated together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusWordPair {
    narrow: String,
    wide: String,
}

impl StatusWordPair {
    pub fn new() -> Self {
        Self {
            narrow: DEFAULT_NARROW.to_string(),
            wide: DEFAULT_WIDE.to_string(),
        }
    }

    pub fn narrow(&self) -> &str {
        &self.narrow
    }

    pub fn wide(&self) -> &str {
        &self.wide
    }

    /// Record text for a dialect
    pub fn record(&self, dialect: Dialect) -> &str {
        match dialect {
            Dialect::Narrow => &self.narrow,
            Dialect::Wide => &self.wide,
        }
    }

    /// Apply one property change to both records
    ///
    /// An empty value is ignored. Any decode or value error leaves both
    /// records untouched.
    pub fn update(&mut self, property: &str, value: &str) -> Result<(), ParseError> {
        let prop = StatusProperty::from_name(property)
            .ok_or_else(|| ParseError::UnknownProperty(property.to_string()))?;
        if value.is_empty() {
            return Ok(());
        }
        self.apply(prop, value)
    }

    /// Apply a typed property change to both records
    pub fn apply(&mut self, prop: StatusProperty, value: &str) -> Result<(), ParseError> {
        let mut narrow = StatusRecord::decode(Dialect::Narrow, &self.narrow)?;
        let mut wide = StatusRecord::decode(Dialect::Wide, &self.wide)?;

        match prop {
            StatusProperty::ActiveRx => {
                let d = parse_digit("active rx", value)?;
                narrow.active_rx = d;
                wide.active_rx = d;
            }
            StatusProperty::ActiveTx => {
                let d = parse_digit("active tx", value)?;
                narrow.active_tx = d;
                wide.active_tx = d;
            }
            StatusProperty::Frequency => {
                let hz: u64 = value.parse().map_err(|_| invalid("frequency", value))?;
                if hz > MAX_FREQUENCY {
                    return Err(invalid("frequency", value));
                }
                narrow.frequency_hz = hz;
                wide.frequency_hz = hz;
            }
            StatusProperty::RitOffset => {
                let offset: i32 = value.parse().map_err(|_| invalid("rit offset", value))?;
                if offset.abs() > MAX_RIT {
                    return Err(invalid("rit offset", value));
                }
                narrow.rit_offset = offset;
                wide.rit_offset = offset;
            }
            StatusProperty::RitEnabled => {
                let on = parse_flag("rit", value)?;
                narrow.rit_enabled = on;
                wide.rit_enabled = on;
            }
            StatusProperty::XitEnabled => {
                let on = parse_flag("xit", value)?;
                narrow.xit_enabled = on;
                wide.xit_enabled = on;
            }
            StatusProperty::Mox => {
                let on = parse_flag("mox", value)?;
                narrow.mox = on;
                wide.mox = on;
            }
            StatusProperty::WideMode => {
                narrow.mode = mode::wide_to_narrow(value)?.to_string();
                wide.mode = value.to_string();
            }
            StatusProperty::NarrowMode => {
                wide.mode = mode::narrow_to_wide(value)?.to_string();
                narrow.mode = value.to_string();
            }
            StatusProperty::TuneStep => {
                let step: u32 = value.parse().map_err(|_| invalid("step", value))?;
                let step = step.min(MAX_STEP) as u16;
                narrow.step = step;
                wide.step = step;
            }
        }

        self.narrow = narrow.encode();
        self.wide = wide.encode();
        Ok(())
    }

    /// Rebuild both records from canonical slice state
    ///
    /// Memory bank, scan, CTCSS, tone and shift fields keep their current
    /// values.
    pub fn rebuild(&mut self, snapshot: &StatusSnapshot) -> Result<(), ParseError> {
        let mut narrow = StatusRecord::decode(Dialect::Narrow, &self.narrow)?;
        let mut wide = StatusRecord::decode(Dialect::Wide, &self.wide)?;

        for record in [&mut narrow, &mut wide] {
            record.frequency_hz = snapshot.frequency_hz.min(MAX_FREQUENCY);
            record.step = snapshot.step.min(MAX_STEP) as u16;
            record.rit_offset = snapshot.rit_offset.clamp(-MAX_RIT, MAX_RIT);
            record.rit_enabled = snapshot.rit_enabled;
            record.xit_enabled = snapshot.xit_enabled;
            record.mox = snapshot.mox;
            record.active_rx = u8::from(snapshot.active_rx);
            record.active_tx = u8::from(snapshot.active_tx);
        }
        narrow.mode = snapshot.mode.narrow_code(snapshot.cw_lower).to_string();
        wide.mode = snapshot.mode.wide_code(snapshot.cw_lower).to_string();

        self.narrow = narrow.encode();
        self.wide = wide.encode();
        Ok(())
    }
}

impl Default for StatusWordPair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_decode() {
        let narrow = StatusRecord::decode(Dialect::Narrow, DEFAULT_NARROW).unwrap();
        assert_eq!(narrow.frequency_hz, 14_100_000);
        assert_eq!(narrow.step, 1000);
        assert_eq!(narrow.mode, "2");

        let wide = StatusRecord::decode(Dialect::Wide, DEFAULT_WIDE).unwrap();
        assert_eq!(wide.mode, "01");
        assert_eq!(wide.encode(), DEFAULT_WIDE);
        assert_eq!(narrow.encode(), DEFAULT_NARROW);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(
            StatusRecord::decode(Dialect::Narrow, DEFAULT_WIDE),
            Err(ParseError::InvalidLength { expected: 35, actual: 36 })
        ));
        let bad_sign = DEFAULT_NARROW.replacen('+', "*", 1);
        assert!(StatusRecord::decode(Dialect::Narrow, &bad_sign).is_err());
        let bad_freq = format!("X{}", &DEFAULT_NARROW[1..]);
        assert!(StatusRecord::decode(Dialect::Narrow, &bad_freq).is_err());
    }

    #[test]
    fn test_frequency_update_hits_both_records() {
        let mut pair = StatusWordPair::new();
        pair.update("Freq", "7074000").unwrap();
        assert!(pair.narrow().starts_with("00007074000"));
        assert!(pair.wide().starts_with("00007074000"));
        assert_eq!(pair.narrow().len(), NARROW_LEN);
        assert_eq!(pair.wide().len(), WIDE_LEN);
    }

    #[test]
    fn test_rit_fields() {
        let mut pair = StatusWordPair::new();
        pair.update("RITFreq", "-125").unwrap();
        pair.update("RITStat", "1").unwrap();
        assert_eq!(&pair.narrow()[15..22], "-001251");
        assert_eq!(&pair.wide()[15..22], "-001251");

        pair.update("RITFREQ", "+00050").unwrap();
        assert_eq!(&pair.narrow()[15..21], "+00050");
    }

    #[test]
    fn test_mode_translation() {
        let mut pair = StatusWordPair::new();
        pair.update("DemodMode", "03").unwrap();
        assert_eq!(&pair.wide()[27..29], "03");
        assert_eq!(&pair.narrow()[27..28], "7");

        pair.update("DemodMode0K", "9").unwrap();
        assert_eq!(&pair.wide()[27..29], "07");
        assert_eq!(&pair.narrow()[27..28], "9");
    }

    #[test]
    fn test_failed_update_leaves_records() {
        let mut pair = StatusWordPair::new();
        assert!(pair.update("DemodMode", "99").is_err());
        assert!(pair.update("Freq", "abc").is_err());
        assert!(matches!(
            pair.update("Squelch", "1"),
            Err(ParseError::UnknownProperty(_))
        ));
        assert_eq!(pair, StatusWordPair::new());
    }

    #[test]
    fn test_empty_value_ignored() {
        let mut pair = StatusWordPair::new();
        pair.update("Freq", "").unwrap();
        assert_eq!(pair, StatusWordPair::new());
    }

    #[test]
    fn test_tune_step_clamped() {
        let mut pair = StatusWordPair::new();
        pair.update("TuneStep", "25000").unwrap();
        assert_eq!(&pair.narrow()[11..15], "9999");
    }

    #[test]
    fn test_active_flags_and_mox() {
        let mut pair = StatusWordPair::new();
        pair.update("ActiveRX", "1").unwrap();
        pair.update("TXVFO", "1").unwrap();
        pair.update("TX", "1").unwrap();
        assert_eq!(&pair.narrow()[28..29], "1");
        assert_eq!(&pair.narrow()[30..31], "1");
        assert_eq!(&pair.wide()[29..30], "1");
        assert_eq!(&pair.wide()[31..32], "1");
        assert_eq!(&pair.wide()[26..27], "1");
    }

    #[test]
    fn test_rebuild_from_snapshot() {
        let mut pair = StatusWordPair::new();
        pair.rebuild(&StatusSnapshot {
            frequency_hz: 3_573_000,
            step: 10,
            rit_offset: 0,
            rit_enabled: false,
            xit_enabled: true,
            mox: false,
            mode: DemodMode::DigU,
            cw_lower: false,
            active_rx: true,
            active_tx: false,
        })
        .unwrap();
        let narrow = StatusRecord::decode(Dialect::Narrow, pair.narrow()).unwrap();
        assert_eq!(narrow.frequency_hz, 3_573_000);
        assert_eq!(narrow.mode, "9");
        assert!(narrow.xit_enabled);
        let wide = StatusRecord::decode(Dialect::Wide, pair.wide()).unwrap();
        assert_eq!(wide.mode, "07");
        assert_eq!(wide.active_rx, 1);
    }
}
