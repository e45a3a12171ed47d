//! Simulated radio
//!
//! Stands in for the radio's network API. Commanded properties are applied
//! to the simulated state silently, the way the real radio accepts a set.
//! Changes that start on the radio itself (tuning, keying, slices opened on
//! the front panel) are reported as [`RadioNotification`]s.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cat_gateway::{
    InterlockState, RadioLink, RadioNotification, RadioProperty, SliceProperty, SliceState,
};
use cat_gateway::state::SLICE_COUNT;
use cat_protocol::DemodMode;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::keyer::{run_sim_keyer, KeyerCommand};

/// A slice present when the simulation starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimSlice {
    pub frequency_hz: u64,
    pub mode: DemodMode,
}

/// Configuration for creating a simulated radio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimRadioConfig {
    /// Serial number reported for port assignments
    pub serial: String,
    pub slices: Vec<SimSlice>,
    /// Confirm slices created through the link
    pub acknowledge_slices: bool,
    /// Time the keyer takes per character
    pub char_time_ms: u64,
}

impl Default for SimRadioConfig {
    fn default() -> Self {
        Self {
            serial: "SIM-0001".to_string(),
            slices: vec![SimSlice {
                frequency_hz: 14_250_000,
                mode: DemodMode::Usb,
            }],
            acknowledge_slices: true,
            char_time_ms: 60,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    slices: [Option<SliceState>; SLICE_COUNT],
    mox: bool,
    cw_lower: bool,
    cw_speed: u8,
    cw_pitch: u16,
    rf_power: u8,
    interlock: Option<InterlockState>,
    cw_text: String,
}

/// A radio simulated in memory
pub struct SimRadio {
    config: SimRadioConfig,
    state: Mutex<SimState>,
    notifications: mpsc::UnboundedSender<RadioNotification>,
    keyer: mpsc::UnboundedSender<KeyerCommand>,
}

impl SimRadio {
    /// Start the simulation and its keyer task
    ///
    /// Returns the radio and the receiving end of its notification stream.
    /// Configured slices are announced on the stream right away. Must be
    /// called inside a tokio runtime.
    pub fn start(
        config: SimRadioConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<RadioNotification>) {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (keyer_tx, keyer_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_sim_keyer(
            keyer_rx,
            notify_tx.clone(),
            Duration::from_millis(config.char_time_ms),
        ));

        let radio = Arc::new(Self {
            config,
            state: Mutex::new(SimState {
                cw_speed: 20,
                cw_pitch: 600,
                rf_power: 100,
                ..SimState::default()
            }),
            notifications: notify_tx,
            keyer: keyer_tx,
        });

        info!("Simulated radio {} started", radio.config.serial);
        let initial = radio.config.slices.clone();
        for (index, slice) in initial.into_iter().take(SLICE_COUNT).enumerate() {
            radio.open_slice(index, SliceState::new(slice.frequency_hz, slice.mode));
        }
        (radio, notify_rx)
    }

    pub fn serial(&self) -> &str {
        &self.config.serial
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notification: RadioNotification) {
        let _ = self.notifications.send(notification);
    }

    fn open_slice(&self, index: usize, slice: SliceState) {
        if index >= SLICE_COUNT {
            return;
        }
        self.state().slices[index] = Some(slice.clone());
        self.notify(RadioNotification::SliceAdded {
            index,
            state: slice,
        });
    }

    // ------------------------------------------------------------------------
    // Front-panel actions
    // ------------------------------------------------------------------------

    /// Tune a slice from the radio side
    pub fn tune(&self, index: usize, frequency_hz: u64) {
        self.change_slice(index, SliceProperty::Frequency(frequency_hz));
    }

    /// Change a slice's mode from the radio side
    pub fn select_mode(&self, index: usize, mode: DemodMode) {
        self.change_slice(index, SliceProperty::Mode(mode));
    }

    /// Key or unkey the transmitter from the radio side
    pub fn key(&self, on: bool) {
        self.apply_radio(RadioProperty::Mox(on));
        self.notify(RadioNotification::RadioChanged(RadioProperty::Mox(on)));
    }

    /// Open a slice from the radio side
    pub fn add_slice(&self, index: usize, frequency_hz: u64, mode: DemodMode) {
        self.open_slice(index, SliceState::new(frequency_hz, mode));
    }

    /// Close a slice from the radio side
    pub fn close_slice(&self, index: usize) {
        if index < SLICE_COUNT && self.state().slices[index].take().is_some() {
            self.notify(RadioNotification::SliceRemoved { index });
        }
    }

    /// Force the reported interlock state; `None` follows MOX
    pub fn set_interlock(&self, state: Option<InterlockState>) {
        self.state().interlock = state;
    }

    fn change_slice(&self, index: usize, property: SliceProperty) {
        if self.apply_slice(index, property) {
            self.notify(RadioNotification::SliceChanged { index, property });
        }
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn slice(&self, index: usize) -> Option<SliceState> {
        self.state().slices.get(index).cloned().flatten()
    }

    pub fn mox(&self) -> bool {
        self.state().mox
    }

    pub fn cw_lower(&self) -> bool {
        self.state().cw_lower
    }

    pub fn cw_speed(&self) -> u8 {
        self.state().cw_speed
    }

    pub fn cw_pitch(&self) -> u16 {
        self.state().cw_pitch
    }

    pub fn rf_power(&self) -> u8 {
        self.state().rf_power
    }

    /// All text handed to the keyer since start
    pub fn cw_text(&self) -> String {
        self.state().cw_text.clone()
    }

    /// Returns false if the slice is absent
    fn apply_slice(&self, index: usize, property: SliceProperty) -> bool {
        let mut state = self.state();
        let Some(slice) = state.slices.get_mut(index).and_then(Option::as_mut) else {
            debug!("Simulated slice {} absent, {:?} dropped", index, property);
            return false;
        };
        match property {
            SliceProperty::Frequency(hz) => slice.frequency_hz = hz,
            SliceProperty::Mode(mode) => slice.mode = mode,
            SliceProperty::TuneStep(step) => slice.tune_step = step,
            SliceProperty::RitEnabled(on) => slice.rit_enabled = on,
            SliceProperty::RitOffset(offset) => slice.rit_offset = offset,
            SliceProperty::XitEnabled(on) => slice.xit_enabled = on,
            SliceProperty::XitOffset(offset) => slice.xit_offset = offset,
            SliceProperty::Active(on) => slice.active_rx = on,
            SliceProperty::Transmit(on) => slice.active_tx = on,
            SliceProperty::AudioGain(gain) => slice.audio_gain = gain,
            SliceProperty::AudioPan(pan) => slice.audio_pan = pan,
            SliceProperty::AudioMute(mute) => slice.audio_mute = mute,
            SliceProperty::Filter(passband) => slice.filter = passband,
            SliceProperty::Agc(agc) => slice.agc = agc,
        }

        let focus: Option<fn(&mut SliceState)> = match property {
            SliceProperty::Active(true) => Some(|s: &mut SliceState| s.active_rx = false),
            SliceProperty::Transmit(true) => Some(|s: &mut SliceState| s.active_tx = false),
            _ => None,
        };
        if let Some(clear) = focus {
            for (i, other) in state.slices.iter_mut().enumerate() {
                if let Some(other) = other.as_mut().filter(|_| i != index) {
                    clear(other);
                }
            }
        }
        true
    }

    fn apply_radio(&self, property: RadioProperty) {
        let mut state = self.state();
        match property {
            RadioProperty::Mox(on) => state.mox = on,
            RadioProperty::CwLower(lower) => state.cw_lower = lower,
            RadioProperty::CwSpeed(wpm) => state.cw_speed = wpm,
            RadioProperty::CwPitch(hz) => state.cw_pitch = hz,
            RadioProperty::RfPower(power) => state.rf_power = power,
        }
    }
}

impl RadioLink for SimRadio {
    fn set_slice_property(&self, index: usize, property: SliceProperty) {
        debug!("Sim slice {} <- {:?}", index, property);
        self.apply_slice(index, property);
    }

    fn set_radio_property(&self, property: RadioProperty) {
        debug!("Sim radio <- {:?}", property);
        self.apply_radio(property);
    }

    fn send_cw(&self, text: &str) {
        self.state().cw_text.push_str(text);
        let _ = self.keyer.send(KeyerCommand::Send(text.to_string()));
    }

    fn clear_cw(&self) {
        let _ = self.keyer.send(KeyerCommand::Clear);
    }

    fn create_slice(&self, index: usize, frequency_hz: u64, mode: DemodMode) {
        if !self.config.acknowledge_slices {
            debug!("Sim ignoring creation of slice {}", index);
            return;
        }
        info!("Sim creating slice {} at {} Hz", index, frequency_hz);
        self.open_slice(index, SliceState::new(frequency_hz, mode));
    }

    fn remove_slice(&self, index: usize) {
        self.close_slice(index);
    }

    fn interlock_state(&self) -> InterlockState {
        let state = self.state();
        match state.interlock {
            Some(interlock) => interlock,
            None if state.mox => InterlockState::Transmitting,
            None => InterlockState::Ready,
        }
    }

    fn slice_acknowledged(&self, index: usize) -> bool {
        self.state()
            .slices
            .get(index)
            .is_some_and(Option::is_some)
    }
}
