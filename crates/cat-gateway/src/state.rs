//! Canonical radio state
//!
//! Two slice slots, each behind its own lock together with that slice's
//! status-word pair, plus one lock for radio-wide values. Writers lock the
//! radio first when they need both, and never hold a slice lock while
//! taking the other slice's lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use cat_protocol::{AgcMode, DemodMode, FilterContext, Passband, StatusSnapshot, StatusWordPair};

/// Number of slices the gateway addresses
pub const SLICE_COUNT: usize = 2;

/// Frequency used for a slice created without a template
pub const DEFAULT_FREQUENCY_HZ: u64 = 14_100_000;

/// Maximum RIT/XIT offset magnitude in Hz
pub const MAX_OFFSET_HZ: i32 = 99_999;

/// State of one receiver slice
#[derive(Debug, Clone, PartialEq)]
pub struct SliceState {
    pub frequency_hz: u64,
    pub mode: DemodMode,
    pub tune_step: u32,
    pub rit_enabled: bool,
    pub rit_offset: i32,
    pub xit_enabled: bool,
    pub xit_offset: i32,
    pub active_rx: bool,
    pub active_tx: bool,
    pub audio_gain: u8,
    pub audio_pan: u8,
    pub audio_mute: bool,
    pub filter: Passband,
    pub agc: AgcMode,
}

impl SliceState {
    pub fn new(frequency_hz: u64, mode: DemodMode) -> Self {
        Self {
            frequency_hz,
            mode,
            tune_step: 100,
            rit_enabled: false,
            rit_offset: 0,
            xit_enabled: false,
            xit_offset: 0,
            active_rx: false,
            active_tx: false,
            audio_gain: 50,
            audio_pan: 50,
            audio_mute: false,
            filter: Passband::default(),
            agc: AgcMode::default(),
        }
    }

    /// Field values for a full status-word rebuild
    pub fn snapshot(&self, radio: &RadioState) -> StatusSnapshot {
        StatusSnapshot {
            frequency_hz: self.frequency_hz,
            step: self.tune_step,
            rit_offset: self.rit_offset,
            rit_enabled: self.rit_enabled,
            xit_enabled: self.xit_enabled,
            mox: radio.mox,
            mode: self.mode,
            cw_lower: radio.cw_lower,
            active_rx: self.active_rx && !radio.so2r,
            active_tx: self.active_tx && !radio.so2r,
        }
    }

    /// Default RIT step for RU/RD without an explicit step
    pub fn rit_step(&self) -> i32 {
        match self.mode {
            DemodMode::Cw | DemodMode::DigL | DemodMode::DigU | DemodMode::Rtty => 10,
            _ => 50,
        }
    }
}

impl Default for SliceState {
    fn default() -> Self {
        Self::new(DEFAULT_FREQUENCY_HZ, DemodMode::Usb)
    }
}

/// Radio-wide values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioState {
    pub mox: bool,
    pub cw_lower: bool,
    pub cw_speed: u8,
    pub cw_pitch: u16,
    pub rf_power: u8,
    /// Auto-information level; non-zero enables frequency broadcasts
    pub auto_info: u8,
    /// An SO2R port is open
    pub so2r: bool,
    pub digu_offset: i32,
    pub digl_offset: i32,
    pub rtty_shift: i32,
    pub identity: String,
}

impl RadioState {
    pub fn filter_context(&self) -> FilterContext {
        FilterContext {
            cw_pitch: i32::from(self.cw_pitch),
            cw_lower: self.cw_lower,
            digu_offset: self.digu_offset,
            digl_offset: self.digl_offset,
            rtty_shift: self.rtty_shift,
        }
    }
}

impl Default for RadioState {
    fn default() -> Self {
        Self {
            mox: false,
            cw_lower: false,
            cw_speed: 20,
            cw_pitch: 600,
            rf_power: 100,
            auto_info: 0,
            so2r: false,
            digu_offset: 1500,
            digl_offset: 2210,
            rtty_shift: 170,
            identity: "904".to_string(),
        }
    }
}

/// One slice slot: the slice (if present) and its status-word pair
#[derive(Debug, Clone, Default)]
pub struct SliceSlot {
    pub state: Option<SliceState>,
    pub status: StatusWordPair,
}

/// Lock-partitioned canonical state
#[derive(Debug, Default)]
pub struct CanonicalState {
    slices: [Mutex<SliceSlot>; SLICE_COUNT],
    radio: Mutex<RadioState>,
}

impl CanonicalState {
    pub fn new(radio: RadioState) -> Self {
        Self {
            slices: Default::default(),
            radio: Mutex::new(radio),
        }
    }

    /// Lock a slice slot
    ///
    /// # Panics
    /// Panics if `index >= SLICE_COUNT`; callers validate slice indices.
    pub fn slice(&self, index: usize) -> MutexGuard<'_, SliceSlot> {
        self.slices[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn radio(&self) -> MutexGuard<'_, RadioState> {
        self.radio.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the radio-wide values
    pub fn radio_snapshot(&self) -> RadioState {
        self.radio().clone()
    }

    /// Copy of a slice, if present
    pub fn slice_state(&self, index: usize) -> Option<SliceState> {
        self.slice(index).state.clone()
    }

    pub fn has_slice(&self, index: usize) -> bool {
        self.slice(index).state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_hides_active_flags_in_so2r() {
        let mut slice = SliceState::new(7_074_000, DemodMode::DigU);
        slice.active_rx = true;
        slice.active_tx = true;

        let mut radio = RadioState::default();
        let snapshot = slice.snapshot(&radio);
        assert!(snapshot.active_rx);
        assert!(snapshot.active_tx);

        radio.so2r = true;
        let snapshot = slice.snapshot(&radio);
        assert!(!snapshot.active_rx);
        assert!(!snapshot.active_tx);
    }

    #[test]
    fn test_slots_start_empty() {
        let state = CanonicalState::default();
        assert!(!state.has_slice(0));
        assert!(!state.has_slice(1));
        assert_eq!(
            state.slice(0).status.narrow(),
            cat_protocol::status_word::DEFAULT_NARROW
        );
    }

    #[test]
    fn test_filter_context_from_radio() {
        let radio = RadioState {
            cw_lower: true,
            cw_pitch: 700,
            ..Default::default()
        };
        let ctx = radio.filter_context();
        assert!(ctx.cw_lower);
        assert_eq!(ctx.cw_pitch, 700);
    }

    #[test]
    fn test_rit_step_by_mode() {
        assert_eq!(SliceState::new(7_000_000, DemodMode::Cw).rit_step(), 10);
        assert_eq!(SliceState::new(7_200_000, DemodMode::Lsb).rit_step(), 50);
    }
}
