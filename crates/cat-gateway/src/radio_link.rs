//! Seam between the gateway and the radio's network API
//!
//! Outbound, the processor pushes typed property changes through
//! [`RadioLink`]. Inbound, the link reports what the radio did as
//! [`RadioNotification`]s on an mpsc channel.

use cat_protocol::{AgcMode, DemodMode, Passband};

use crate::state::SliceState;

/// Property change addressed to one slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceProperty {
    Frequency(u64),
    Mode(DemodMode),
    TuneStep(u32),
    RitEnabled(bool),
    RitOffset(i32),
    XitEnabled(bool),
    XitOffset(i32),
    /// Receive focus
    Active(bool),
    /// Transmit slice
    Transmit(bool),
    AudioGain(u8),
    AudioPan(u8),
    AudioMute(bool),
    Filter(Passband),
    Agc(AgcMode),
}

/// Radio-wide property change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioProperty {
    Mox(bool),
    CwLower(bool),
    /// Words per minute
    CwSpeed(u8),
    /// Sidetone pitch in Hz
    CwPitch(u16),
    RfPower(u8),
}

/// Transmit interlock as reported by the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockState {
    Ready,
    NotReady,
    PttRequested,
    Transmitting,
    UnkeyRequested,
}

impl InterlockState {
    pub fn name(&self) -> &'static str {
        match self {
            InterlockState::Ready => "READY",
            InterlockState::NotReady => "NOT_READY",
            InterlockState::PttRequested => "PTT_REQUESTED",
            InterlockState::Transmitting => "TRANSMITTING",
            InterlockState::UnkeyRequested => "UNKEY_REQUESTED",
        }
    }
}

/// Event reported by the radio link
#[derive(Debug, Clone, PartialEq)]
pub enum RadioNotification {
    SliceAdded { index: usize, state: SliceState },
    SliceRemoved { index: usize },
    SliceChanged { index: usize, property: SliceProperty },
    RadioChanged(RadioProperty),
    /// The keyer finished sending one character
    CwCharSent,
    /// The keyer's buffer was erased
    CwBufferErased,
}

/// Keyer progress forwarded to WinKeyer ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyerNotification {
    CharSent,
    BufferErased,
}

/// Outbound half of the radio connection
///
/// All methods are fire-and-forget and must return without waiting on the
/// radio.
pub trait RadioLink: Send + Sync {
    fn set_slice_property(&self, index: usize, property: SliceProperty);

    fn set_radio_property(&self, property: RadioProperty);

    /// Queue text on the radio's CW keyer
    fn send_cw(&self, text: &str);

    fn clear_cw(&self);

    fn create_slice(&self, index: usize, frequency_hz: u64, mode: DemodMode);

    fn remove_slice(&self, index: usize);

    fn interlock_state(&self) -> InterlockState;

    /// Whether the radio has confirmed slice `index`
    fn slice_acknowledged(&self, index: usize) -> bool;
}
