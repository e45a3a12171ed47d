//! Demodulation modes and their dialect codes

use crate::error::TranslationError;

/// Canonical demodulation modes
///
/// CW is a single mode here; the radio-wide lower-sideband flag decides
/// whether it is reported as CWL or CWU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DemodMode {
    Lsb,
    Usb,
    Cw,
    Am,
    Sam,
    Fm,
    Nfm,
    Dfm,
    DigL,
    DigU,
    Fdv,
    Rtty,
}

/// A mode as selected on the wire, with the CW sideband it implies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSelection {
    pub mode: DemodMode,
    /// `Some` only for CW codes, which also choose the sideband
    pub cw_lower: Option<bool>,
}

impl ModeSelection {
    fn plain(mode: DemodMode) -> Self {
        Self {
            mode,
            cw_lower: None,
        }
    }

    fn cw(lower: bool) -> Self {
        Self {
            mode: DemodMode::Cw,
            cw_lower: Some(lower),
        }
    }
}

impl DemodMode {
    /// Returns the radio's name for the mode
    pub fn name(&self) -> &'static str {
        match self {
            DemodMode::Lsb => "LSB",
            DemodMode::Usb => "USB",
            DemodMode::Cw => "CW",
            DemodMode::Am => "AM",
            DemodMode::Sam => "SAM",
            DemodMode::Fm => "FM",
            DemodMode::Nfm => "NFM",
            DemodMode::Dfm => "DFM",
            DemodMode::DigL => "DIGL",
            DemodMode::DigU => "DIGU",
            DemodMode::Fdv => "FDV",
            DemodMode::Rtty => "RTTY",
        }
    }

    /// Parse a radio mode name. `CWL` and `CWU` select CW with a sideband.
    pub fn from_name(name: &str) -> Result<ModeSelection, TranslationError> {
        let selection = match name.to_ascii_uppercase().as_str() {
            "LSB" => ModeSelection::plain(DemodMode::Lsb),
            "USB" => ModeSelection::plain(DemodMode::Usb),
            "CW" => ModeSelection::plain(DemodMode::Cw),
            "CWL" => ModeSelection::cw(true),
            "CWU" => ModeSelection::cw(false),
            "AM" => ModeSelection::plain(DemodMode::Am),
            "SAM" => ModeSelection::plain(DemodMode::Sam),
            "FM" => ModeSelection::plain(DemodMode::Fm),
            "NFM" => ModeSelection::plain(DemodMode::Nfm),
            "DFM" => ModeSelection::plain(DemodMode::Dfm),
            "DIGL" => ModeSelection::plain(DemodMode::DigL),
            "DIGU" => ModeSelection::plain(DemodMode::DigU),
            "FDV" => ModeSelection::plain(DemodMode::Fdv),
            "RTTY" => ModeSelection::plain(DemodMode::Rtty),
            _ => return Err(TranslationError::UnknownMode(name.to_string())),
        };
        Ok(selection)
    }

    /// Name including the CW sideband
    pub fn display_name(&self, cw_lower: bool) -> &'static str {
        match (self, cw_lower) {
            (DemodMode::Cw, true) => "CWL",
            (DemodMode::Cw, false) => "CWU",
            (other, _) => other.name(),
        }
    }

    /// Narrow-dialect single character code
    pub fn narrow_code(&self, cw_lower: bool) -> char {
        match self {
            DemodMode::Lsb => '1',
            DemodMode::Usb => '2',
            DemodMode::Cw if cw_lower => '7',
            DemodMode::Cw => '3',
            DemodMode::Fm | DemodMode::Nfm | DemodMode::Dfm | DemodMode::Fdv => '4',
            DemodMode::Am | DemodMode::Sam => '5',
            DemodMode::DigL | DemodMode::Rtty => '6',
            DemodMode::DigU => '9',
        }
    }

    /// Wide-dialect two character code
    pub fn wide_code(&self, cw_lower: bool) -> &'static str {
        match self {
            DemodMode::Lsb => "00",
            DemodMode::Usb => "01",
            DemodMode::Cw if cw_lower => "03",
            DemodMode::Cw => "04",
            DemodMode::Fm => "05",
            DemodMode::Am => "06",
            DemodMode::DigU => "07",
            DemodMode::DigL => "09",
            DemodMode::Sam => "10",
            DemodMode::Nfm => "11",
            DemodMode::Dfm => "12",
            DemodMode::Fdv => "20",
            DemodMode::Rtty => "30",
        }
    }

    /// Decode a narrow-dialect mode code
    pub fn from_narrow_code(code: &str) -> Result<ModeSelection, TranslationError> {
        let selection = match code {
            "1" => ModeSelection::plain(DemodMode::Lsb),
            "2" => ModeSelection::plain(DemodMode::Usb),
            "3" => ModeSelection::cw(false),
            "4" => ModeSelection::plain(DemodMode::Fm),
            "5" => ModeSelection::plain(DemodMode::Am),
            "6" => ModeSelection::plain(DemodMode::DigL),
            "7" => ModeSelection::cw(true),
            "9" => ModeSelection::plain(DemodMode::DigU),
            _ => {
                return Err(TranslationError::UnmappedModeCode {
                    dialect: "narrow",
                    code: code.to_string(),
                })
            }
        };
        Ok(selection)
    }

    /// Decode a wide-dialect mode code
    pub fn from_wide_code(code: &str) -> Result<ModeSelection, TranslationError> {
        let selection = match code {
            "00" => ModeSelection::plain(DemodMode::Lsb),
            "01" => ModeSelection::plain(DemodMode::Usb),
            "03" => ModeSelection::cw(true),
            "04" => ModeSelection::cw(false),
            "05" => ModeSelection::plain(DemodMode::Fm),
            "06" => ModeSelection::plain(DemodMode::Am),
            "07" => ModeSelection::plain(DemodMode::DigU),
            "09" => ModeSelection::plain(DemodMode::DigL),
            "10" => ModeSelection::plain(DemodMode::Sam),
            "11" => ModeSelection::plain(DemodMode::Nfm),
            "12" => ModeSelection::plain(DemodMode::Dfm),
            "20" => ModeSelection::plain(DemodMode::Fdv),
            "30" => ModeSelection::plain(DemodMode::Rtty),
            _ => {
                return Err(TranslationError::UnmappedModeCode {
                    dialect: "wide",
                    code: code.to_string(),
                })
            }
        };
        Ok(selection)
    }

    /// True for modes whose passband sits below the carrier
    pub fn is_lower_sideband(&self, cw_lower: bool) -> bool {
        match self {
            DemodMode::Lsb | DemodMode::DigL => true,
            DemodMode::Cw => cw_lower,
            _ => false,
        }
    }
}

impl ModeSelection {
    /// Sideband to report, falling back to the current radio-wide flag
    pub fn cw_lower_or(&self, current: bool) -> bool {
        self.cw_lower.unwrap_or(current)
    }
}

/// Translate a narrow mode code into the wide dialect
pub fn narrow_to_wide(code: &str) -> Result<&'static str, TranslationError> {
    let selection = DemodMode::from_narrow_code(code)?;
    Ok(selection.mode.wide_code(selection.cw_lower_or(false)))
}

/// Translate a wide mode code into the narrow dialect
pub fn wide_to_narrow(code: &str) -> Result<char, TranslationError> {
    let selection = DemodMode::from_wide_code(code)?;
    Ok(selection.mode.narrow_code(selection.cw_lower_or(false)))
}
