//! AGC mode codes

use crate::error::TranslationError;

/// Receiver AGC setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AgcMode {
    Off,
    Slow,
    #[default]
    Medium,
    Fast,
}

impl AgcMode {
    pub fn name(&self) -> &'static str {
        match self {
            AgcMode::Off => "off",
            AgcMode::Slow => "slow",
            AgcMode::Medium => "med",
            AgcMode::Fast => "fast",
        }
    }

    /// Three digit narrow code (`GT`)
    pub fn narrow_code(&self) -> &'static str {
        match self {
            AgcMode::Off => "000",
            AgcMode::Slow => "002",
            AgcMode::Medium => "003",
            AgcMode::Fast => "004",
        }
    }

    /// Single digit wide code (`ZZGT`)
    pub fn wide_code(&self) -> &'static str {
        &self.narrow_code()[2..]
    }

    pub fn from_narrow_code(code: &str) -> Result<Self, TranslationError> {
        match code {
            "000" => Ok(AgcMode::Off),
            "002" => Ok(AgcMode::Slow),
            "003" => Ok(AgcMode::Medium),
            "004" => Ok(AgcMode::Fast),
            _ => Err(TranslationError::UnmappedAgcCode {
                dialect: "narrow",
                code: code.to_string(),
            }),
        }
    }

    pub fn from_wide_code(code: &str) -> Result<Self, TranslationError> {
        match code {
            "0" => Ok(AgcMode::Off),
            "2" => Ok(AgcMode::Slow),
            "3" => Ok(AgcMode::Medium),
            "4" => Ok(AgcMode::Fast),
            _ => Err(TranslationError::UnmappedAgcCode {
                dialect: "wide",
                code: code.to_string(),
            }),
        }
    }
}
