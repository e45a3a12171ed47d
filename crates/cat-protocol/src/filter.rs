//! Receive filter translation
//!
//! The radio describes a filter as a passband (low and high edge in Hz
//! relative to the carrier). Narrow clients set the two edges separately
//! with cut codes (`SL`/`SH`); wide clients pick one of eight per-mode
//! presets (`ZZFI`/`ZZFJ`).

use crate::error::TranslationError;
use crate::mode::DemodMode;

/// Passband edges in Hz relative to the carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Passband {
    pub low: i32,
    pub high: i32,
}

impl Passband {
    pub fn new(low: i32, high: i32) -> Self {
        Self { low, high }
    }

    pub fn width(&self) -> i32 {
        self.high - self.low
    }
}

impl Default for Passband {
    fn default() -> Self {
        Self::new(100, 2800)
    }
}

/// Radio-wide values the preset tables depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterContext {
    pub cw_pitch: i32,
    pub cw_lower: bool,
    pub digu_offset: i32,
    pub digl_offset: i32,
    pub rtty_shift: i32,
}

impl Default for FilterContext {
    fn default() -> Self {
        Self {
            cw_pitch: 600,
            cw_lower: false,
            digu_offset: 1500,
            digl_offset: 2210,
            rtty_shift: 170,
        }
    }
}

/// Which edge a narrow cut code addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutEdge {
    /// `SL`
    Low,
    /// `SH`
    High,
}

/// Number of presets per mode in the wide dialect
pub const PRESET_COUNT: u8 = 8;

const SSB_LOW_CUT: [i32; 12] = [0, 50, 100, 200, 300, 400, 500, 600, 700, 800, 900, 1000];
const SSB_HIGH_CUT: [i32; 12] = [
    1400, 1600, 1800, 2000, 2200, 2400, 2600, 2800, 3000, 3400, 4000, 5000,
];
const AM_HIGH_CUT: [i32; 4] = [2500, 3000, 4000, 5000];

enum CutFamily {
    Upper,
    Lower,
    Am,
}

fn cut_family(mode: DemodMode, cw_lower: bool) -> Result<CutFamily, TranslationError> {
    match mode {
        DemodMode::Usb | DemodMode::DigU => Ok(CutFamily::Upper),
        DemodMode::Lsb | DemodMode::DigL => Ok(CutFamily::Lower),
        DemodMode::Cw if cw_lower => Ok(CutFamily::Lower),
        DemodMode::Cw => Ok(CutFamily::Upper),
        DemodMode::Am | DemodMode::Sam => Ok(CutFamily::Am),
        other => Err(TranslationError::UnmappedFilterMode(other.name())),
    }
}

fn cut_table(
    edge: CutEdge,
    family: &CutFamily,
    mode: DemodMode,
) -> Result<&'static [i32], TranslationError> {
    match (family, edge) {
        (CutFamily::Am, CutEdge::High) => Ok(&AM_HIGH_CUT),
        (CutFamily::Am, CutEdge::Low) => Err(TranslationError::UnmappedFilterMode(mode.name())),
        (_, CutEdge::Low) => Ok(&SSB_LOW_CUT),
        (_, CutEdge::High) => Ok(&SSB_HIGH_CUT),
    }
}

/// Index of the table entry closest to `hz`, splitting at midpoints
fn nearest_code(table: &[i32], hz: i32) -> u8 {
    for (i, pair) in table.windows(2).enumerate() {
        if hz <= (pair[0] + pair[1]) / 2 {
            return i as u8;
        }
    }
    (table.len() - 1) as u8
}

/// Narrow cut code for one edge of the current passband
pub fn cut_code(
    edge: CutEdge,
    mode: DemodMode,
    cw_lower: bool,
    passband: Passband,
) -> Result<u8, TranslationError> {
    let family = cut_family(mode, cw_lower)?;
    let table = cut_table(edge, &family, mode)?;
    let hz = match (family, edge) {
        (CutFamily::Upper, CutEdge::Low) => passband.low,
        (CutFamily::Upper, CutEdge::High) => passband.high,
        (CutFamily::Lower, CutEdge::Low) => -passband.high,
        (CutFamily::Lower, CutEdge::High) => -passband.low,
        (CutFamily::Am, _) => passband.high,
    };
    Ok(nearest_code(table, hz.abs()))
}

/// Apply a narrow cut code to one edge, keeping the other edge
pub fn apply_cut(
    edge: CutEdge,
    code: u8,
    mode: DemodMode,
    cw_lower: bool,
    current: Passband,
) -> Result<Passband, TranslationError> {
    let family = cut_family(mode, cw_lower)?;
    let table = cut_table(edge, &family, mode)?;
    let hz = *table
        .get(code as usize)
        .ok_or_else(|| TranslationError::UnmappedFilterCode {
            mode: mode.name(),
            code: format!("{code:02}"),
        })?;

    let passband = match (family, edge) {
        (CutFamily::Upper, CutEdge::Low) => Passband::new(hz, current.high),
        (CutFamily::Upper, CutEdge::High) => Passband::new(current.low, hz),
        (CutFamily::Lower, CutEdge::Low) => Passband::new(current.low, -hz),
        (CutFamily::Lower, CutEdge::High) => Passband::new(-hz, current.high),
        (CutFamily::Am, _) => Passband::new(-hz, hz),
    };
    Ok(passband)
}

const USB_PRESET_HIGH: [i32; 8] = [4100, 3400, 3000, 2800, 2500, 2200, 1900, 1700];
const AM_PRESET_HALF: [i32; 8] = [10000, 8000, 7000, 6000, 5000, 4000, 3000, 2800];
const DFM_PRESET_HALF: [i32; 8] = [10000, 9000, 8000, 7000, 6000, 5000, 4000, 3000];
const CW_PRESET_HALF: [i32; 8] = [1500, 750, 500, 400, 200, 125, 50, 25];
const DIGI_PRESET_WIDTH: [i32; 8] = [5000, 3000, 2000, 1500, 1000, 600, 300, 100];
const RTTY_PRESET_WIDTH: [i32; 8] = [3000, 1500, 1000, 500, 400, 350, 300, 250];
const FM_PRESET_HALF: i32 = 8000;
const NFM_PRESET_HALF: i32 = 5500;

/// Width thresholds for preset lookup; a width at or below entry `i` maps to code `7 - i`
const SSB_WIDTH_STEPS: [i32; 7] = [1600, 1800, 2100, 2400, 2700, 2900, 3300];
const AM_WIDTH_STEPS: [i32; 7] = [5600, 6000, 8000, 10000, 12000, 14000, 16000];
const CW_WIDTH_STEPS: [i32; 7] = [50, 100, 250, 400, 800, 1000, 1500];
const DIGI_WIDTH_STEPS: [i32; 7] = [100, 300, 600, 1000, 1500, 2000, 3000];
const FM_WIDTH_STEPS: [i32; 7] = [6000, 8000, 10000, 12000, 14000, 16000, 18000];
const RTTY_WIDTH_STEPS: [i32; 7] = [250, 300, 350, 400, 500, 1000, 1500];

fn unmapped_preset(mode: DemodMode, index: u8) -> TranslationError {
    TranslationError::UnmappedFilterCode {
        mode: mode.name(),
        code: format!("{index:02}"),
    }
}

fn cw_passband(low: i32, high: i32, ctx: &FilterContext) -> Passband {
    let pitch = ctx.cw_pitch;
    if ctx.cw_lower {
        let offset = pitch.max(high) - pitch;
        Passband::new(low - offset, high - offset)
    } else {
        let offset = pitch.max(-low) - pitch;
        Passband::new(low + offset, high + offset)
    }
}

fn digi_passband(width: i32, lower: bool, ctx: &FilterContext) -> Passband {
    if width >= 3000 {
        return if lower {
            Passband::new(-width, 0)
        } else {
            Passband::new(0, width)
        };
    }
    let center = if lower { -ctx.digl_offset } else { ctx.digu_offset };
    Passband::new(center - width / 2, center + width / 2)
}

/// Passband for a wide-dialect preset
pub fn preset_passband(
    mode: DemodMode,
    index: u8,
    ctx: &FilterContext,
) -> Result<Passband, TranslationError> {
    if index >= PRESET_COUNT {
        return Err(unmapped_preset(mode, index));
    }
    let i = index as usize;
    let passband = match mode {
        DemodMode::Usb => Passband::new(100, USB_PRESET_HIGH[i]),
        DemodMode::Lsb => Passband::new(-USB_PRESET_HIGH[i], -100),
        DemodMode::Am | DemodMode::Sam => Passband::new(-AM_PRESET_HALF[i], AM_PRESET_HALF[i]),
        DemodMode::Fm => Passband::new(-FM_PRESET_HALF, FM_PRESET_HALF),
        DemodMode::Nfm => Passband::new(-NFM_PRESET_HALF, NFM_PRESET_HALF),
        DemodMode::Dfm => Passband::new(-DFM_PRESET_HALF[i], DFM_PRESET_HALF[i]),
        DemodMode::Cw => cw_passband(-CW_PRESET_HALF[i], CW_PRESET_HALF[i], ctx),
        DemodMode::DigU => digi_passband(DIGI_PRESET_WIDTH[i], false, ctx),
        DemodMode::DigL => digi_passband(DIGI_PRESET_WIDTH[i], true, ctx),
        DemodMode::Rtty => {
            let width = RTTY_PRESET_WIDTH[i];
            let high = (width - ctx.rtty_shift) / 2;
            Passband::new(high - width, high)
        }
        DemodMode::Fdv => return Err(TranslationError::UnmappedFilterMode(mode.name())),
    };
    Ok(passband)
}

/// Preset index that best describes the current passband width
pub fn preset_index(mode: DemodMode, passband: Passband) -> Result<u8, TranslationError> {
    let steps = match mode {
        DemodMode::Usb | DemodMode::Lsb => &SSB_WIDTH_STEPS,
        DemodMode::Am | DemodMode::Sam => &AM_WIDTH_STEPS,
        DemodMode::Cw => &CW_WIDTH_STEPS,
        DemodMode::DigU | DemodMode::DigL => &DIGI_WIDTH_STEPS,
        DemodMode::Fm | DemodMode::Dfm => &FM_WIDTH_STEPS,
        DemodMode::Rtty => &RTTY_WIDTH_STEPS,
        DemodMode::Nfm => {
            return match passband.width() {
                11000 => Ok(3),
                other => Err(TranslationError::UnmappedFilterCode {
                    mode: mode.name(),
                    code: format!("width {other}"),
                }),
            }
        }
        DemodMode::Fdv => return Err(TranslationError::UnmappedFilterMode(mode.name())),
    };

    let width = passband.width();
    let code = steps
        .iter()
        .position(|&limit| width <= limit)
        .map(|i| PRESET_COUNT - 1 - i as u8)
        .unwrap_or(0);
    Ok(code)
}
