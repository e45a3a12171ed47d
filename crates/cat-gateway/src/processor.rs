//! Canonical command processor
//!
//! Every dialect ends up here. A command text is split into prefix, index
//! and suffix, checked against its [`CommandDescriptor`], and executed as a
//! get or a set on the canonical state. Sets go out to the radio through
//! [`RadioLink`]; radio notifications come back in through
//! [`CommandProcessor::handle_notification`]. Both paths keep the
//! status-word pairs current.
//!
//! [`CommandDescriptor`]: crate::descriptor::CommandDescriptor

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cat_protocol::filter::{self, CutEdge};
use cat_protocol::frame::split_prefix;
use cat_protocol::{AgcMode, DemodMode, Dialect, ModeSelection, StatusProperty};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::descriptor::{DescriptorTable, Property};
use crate::error::{GatewayError, ValidationError, ERROR_TOKEN};
use crate::radio_link::{
    InterlockState, KeyerNotification, RadioLink, RadioNotification, RadioProperty, SliceProperty,
};
use crate::state::{
    CanonicalState, RadioState, SliceSlot, SliceState, MAX_OFFSET_HZ, SLICE_COUNT,
};

/// Bounded wait: `attempts` checks spaced by `interval`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub attempts: u32,
    pub interval: Duration,
}

impl PollConfig {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Poll `ready` until it returns true or the attempts run out
    pub async fn wait_until(&self, mut ready: impl FnMut() -> bool) -> bool {
        for _ in 0..self.attempts {
            if ready() {
                return true;
            }
            tokio::time::sleep(self.interval).await;
        }
        false
    }
}

/// Processor timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Wait for the transmit interlock before switching TX
    pub interlock_poll: PollConfig,
    /// Wait for the radio to confirm a newly created slice
    pub slice_ack_poll: PollConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            interlock_poll: PollConfig::new(50, Duration::from_millis(5)),
            slice_ack_poll: PollConfig::new(300, Duration::from_millis(10)),
        }
    }
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

fn not_numeric(property: Property, value: &str) -> GatewayError {
    ValidationError::NotNumeric {
        prefix: format!("{property:?}"),
        value: value.to_string(),
    }
    .into()
}

fn parse_value<T: FromStr>(property: Property, value: &str) -> Result<T, GatewayError> {
    value.parse().map_err(|_| not_numeric(property, value))
}

fn parse_flag(property: Property, value: &str) -> Result<bool, GatewayError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(not_numeric(property, value)),
    }
}

fn parse_slice(property: Property, value: &str) -> Result<usize, GatewayError> {
    let index: usize = parse_value(property, value)?;
    check_slice(index)?;
    Ok(index)
}

fn check_slice(index: usize) -> Result<(), ValidationError> {
    if index < SLICE_COUNT {
        Ok(())
    } else {
        Err(ValidationError::SliceUnavailable(index))
    }
}

/// Executes client commands against the canonical state
pub struct CommandProcessor {
    descriptors: DescriptorTable,
    state: CanonicalState,
    link: Arc<dyn RadioLink>,
    config: ProcessorConfig,
    auto_info_tx: broadcast::Sender<String>,
    keyer_tx: broadcast::Sender<KeyerNotification>,
}

impl CommandProcessor {
    pub fn new(
        descriptors: DescriptorTable,
        radio: RadioState,
        link: Arc<dyn RadioLink>,
        config: ProcessorConfig,
    ) -> Self {
        let (auto_info_tx, _) = broadcast::channel(64);
        let (keyer_tx, _) = broadcast::channel(64);
        Self {
            descriptors,
            state: CanonicalState::new(radio),
            link,
            config,
            auto_info_tx,
            keyer_tx,
        }
    }

    /// Unsolicited frequency frames while auto-information is on
    pub fn subscribe_auto_info(&self) -> broadcast::Receiver<String> {
        self.auto_info_tx.subscribe()
    }

    /// Keyer progress for WinKeyer ports
    pub fn subscribe_keyer(&self) -> broadcast::Receiver<KeyerNotification> {
        self.keyer_tx.subscribe()
    }

    pub fn state(&self) -> &CanonicalState {
        &self.state
    }

    pub fn link(&self) -> &Arc<dyn RadioLink> {
        &self.link
    }

    /// Execute one command text and return the reply
    ///
    /// Sets reply with an empty string; any failure replies with `?;`.
    pub async fn execute(&self, command: &str) -> String {
        let started = Instant::now();
        match self.execute_command(command).await {
            Ok(reply) => {
                debug!(
                    "{} -> {:?} ({:?})",
                    command.trim(),
                    reply,
                    started.elapsed()
                );
                reply
            }
            Err(e) => {
                warn!("{} rejected: {}", command.trim(), e);
                ERROR_TOKEN.to_string()
            }
        }
    }

    async fn execute_command(&self, command: &str) -> Result<String, GatewayError> {
        let body = command
            .trim()
            .trim_end_matches(';')
            .trim()
            .to_ascii_uppercase();
        let (prefix, rest) = split_prefix(&body);
        let descriptor = self
            .descriptors
            .get(prefix)
            .ok_or_else(|| ValidationError::UnknownPrefix(prefix.to_string()))?;

        let (index, suffix) = match (
            rest.get(..descriptor.index_length),
            rest.get(descriptor.index_length..),
        ) {
            (Some(index), Some(suffix)) => (index, suffix),
            _ => {
                return Err(ValidationError::InvalidLength {
                    prefix: prefix.to_string(),
                    length: body.len(),
                }
                .into())
            }
        };

        if descriptor.read_only && !suffix.is_empty() {
            return Err(ValidationError::ReadOnly(prefix.to_string()).into());
        }
        descriptor.validate(index, suffix)?;

        let property = if index.is_empty() {
            descriptor.property
        } else {
            let radio_index: usize = index.parse().map_err(|_| ValidationError::NotNumeric {
                prefix: prefix.to_string(),
                value: index.to_string(),
            })?;
            descriptor
                .property
                .indexed(radio_index)
                .ok_or(ValidationError::SliceUnavailable(radio_index))?
        };

        if !suffix.is_empty() || descriptor.write_only {
            self.set(property, suffix).await?;
            return Ok(String::new());
        }

        let value = self.get(property)?;
        Ok(format!("{}{}{};", prefix, index, descriptor.format(&value)))
    }

    /// Current canonical value of a property, unformatted
    pub fn get(&self, property: Property) -> Result<String, GatewayError> {
        use Property::*;

        let radio = self.state.radio_snapshot();
        let value = match property {
            AutoInfo => radio.auto_info.to_string(),
            ActiveRx => self.focused_slice(|s| s.active_rx).to_string(),
            ActiveTx => self.focused_slice(|s| s.active_tx).to_string(),
            StatusNarrow0 => self.present_status_word(0, Dialect::Narrow)?,
            StatusNarrow1 => self.present_status_word(1, Dialect::Narrow)?,
            StatusWide0 => self.present_status_word(0, Dialect::Wide)?,
            StatusWide1 => self.present_status_word(1, Dialect::Wide)?,
            Mox => flag(radio.mox).to_string(),
            CwSpeed => radio.cw_speed.to_string(),
            RfPower => radio.rf_power.to_string(),
            Identity => radio.identity,
            PowerOn => "1".to_string(),
            Interlock => self.link.interlock_state().name().to_string(),
            _ => self.get_slice_value(property, &radio)?,
        };
        Ok(value)
    }

    fn get_slice_value(&self, property: Property, radio: &RadioState) -> Result<String, GatewayError> {
        use Property::*;

        let write_only = || ValidationError::WriteOnly(format!("{property:?}"));
        let index = property.slice().ok_or_else(write_only)?;
        let slot = self.state.slice(index);
        let slice = slot
            .state
            .as_ref()
            .ok_or(ValidationError::SliceUnavailable(index))?;

        let value = match property {
            Freq0 | Freq1 => slice.frequency_hz.to_string(),
            ModeNarrow0 => slice.mode.narrow_code(radio.cw_lower).to_string(),
            ModeWide0 | ModeWide1 => slice.mode.wide_code(radio.cw_lower).to_string(),
            RitOn0 | RitOn1 => flag(slice.rit_enabled).to_string(),
            XitOn0 => flag(slice.xit_enabled).to_string(),
            RitOffset0 | RitOffset1 => slice.rit_offset.to_string(),
            AfGain0 | AfGain1 => slice.audio_gain.to_string(),
            LowCut0 => {
                filter::cut_code(CutEdge::Low, slice.mode, radio.cw_lower, slice.filter)?
                    .to_string()
            }
            HighCut0 => {
                filter::cut_code(CutEdge::High, slice.mode, radio.cw_lower, slice.filter)?
                    .to_string()
            }
            FilterPreset0 | FilterPreset1 => {
                filter::preset_index(slice.mode, slice.filter)?.to_string()
            }
            AgcNarrow0 => slice.agc.narrow_code().to_string(),
            AgcWide0 => slice.agc.wide_code().to_string(),
            TuneStep0 => slice.tune_step.to_string(),
            AudioMute0 | AudioMute1 => flag(slice.audio_mute).to_string(),
            AudioPan0 | AudioPan1 => slice.audio_pan.to_string(),
            _ => return Err(write_only().into()),
        };
        Ok(value)
    }

    /// Set a property from its canonical text value
    pub async fn set(&self, property: Property, value: &str) -> Result<(), GatewayError> {
        use Property::*;

        match property {
            AutoInfo => {
                self.state.radio().auto_info = parse_value(property, value)?;
            }
            Freq0 | Freq1 => {
                let hz = parse_value(property, value)?;
                self.command_slice(slice_of(property), SliceProperty::Frequency(hz))?;
            }
            ActiveRx => {
                let index = parse_slice(property, value)?;
                self.command_slice(index, SliceProperty::Active(true))?;
            }
            ActiveTx => {
                let index = parse_slice(property, value)?;
                if !self.ensure_slice(index).await {
                    return Err(ValidationError::SliceUnavailable(index).into());
                }
                self.command_slice(index, SliceProperty::Transmit(true))?;
            }
            ModeNarrow0 => self.select_mode(0, DemodMode::from_narrow_code(value)?)?,
            ModeWide0 | ModeWide1 => {
                self.select_mode(slice_of(property), DemodMode::from_wide_code(value)?)?
            }
            RitOn0 | RitOn1 => {
                let on = parse_flag(property, value)?;
                self.command_slice(slice_of(property), SliceProperty::RitEnabled(on))?;
            }
            XitOn0 => {
                let on = parse_flag(property, value)?;
                self.command_slice(0, SliceProperty::XitEnabled(on))?;
            }
            RitClear => self.command_slice(0, SliceProperty::RitOffset(0))?,
            XitClear => self.command_slice(0, SliceProperty::XitOffset(0))?,
            RitUp | RitDown => {
                let (current, default_step) = self.with_slice(0, |s| (s.rit_offset, s.rit_step()))?;
                let step = if value.is_empty() {
                    default_step
                } else {
                    parse_value(property, value)?
                };
                let offset = if property == RitUp {
                    current.saturating_add(step)
                } else {
                    current.saturating_sub(step)
                };
                self.command_slice(0, SliceProperty::RitOffset(offset))?;
            }
            RitOffset0 | RitOffset1 => {
                let offset = parse_value(property, value)?;
                self.command_slice(slice_of(property), SliceProperty::RitOffset(offset))?;
            }
            Transmit => self.command_radio(RadioProperty::Mox(true))?,
            Receive => self.command_radio(RadioProperty::Mox(false))?,
            Mox => {
                let on = parse_flag(property, value)?;
                self.command_radio(RadioProperty::Mox(on))?;
            }
            AfGain0 | AfGain1 => {
                let gain = parse_value(property, value)?;
                self.command_slice(slice_of(property), SliceProperty::AudioGain(gain))?;
            }
            CwSpeed => {
                let wpm = parse_value(property, value)?;
                self.command_radio(RadioProperty::CwSpeed(wpm))?;
            }
            CwSend => {
                let text = value.strip_prefix(' ').unwrap_or(value);
                self.send_cw(text);
            }
            LowCut0 | HighCut0 => {
                let edge = if property == LowCut0 {
                    CutEdge::Low
                } else {
                    CutEdge::High
                };
                let code = parse_value(property, value)?;
                let cw_lower = self.state.radio().cw_lower;
                let (mode, current) = self.with_slice(0, |s| (s.mode, s.filter))?;
                let passband = filter::apply_cut(edge, code, mode, cw_lower, current)?;
                self.command_slice(0, SliceProperty::Filter(passband))?;
            }
            FilterPreset0 | FilterPreset1 => {
                let index = slice_of(property);
                let preset = parse_value(property, value)?;
                let ctx = self.state.radio().filter_context();
                let mode = self.with_slice(index, |s| s.mode)?;
                let passband = filter::preset_passband(mode, preset, &ctx)?;
                self.command_slice(index, SliceProperty::Filter(passband))?;
            }
            AgcNarrow0 => {
                self.command_slice(0, SliceProperty::Agc(AgcMode::from_narrow_code(value)?))?
            }
            AgcWide0 => {
                self.command_slice(0, SliceProperty::Agc(AgcMode::from_wide_code(value)?))?
            }
            RfPower => {
                let power = parse_value(property, value)?;
                self.command_radio(RadioProperty::RfPower(power))?;
            }
            TuneStep0 => {
                let step = parse_value(property, value)?;
                self.command_slice(0, SliceProperty::TuneStep(step))?;
            }
            AudioMute0 | AudioMute1 => {
                let mute = parse_flag(property, value)?;
                self.command_slice(slice_of(property), SliceProperty::AudioMute(mute))?;
            }
            AudioPan0 | AudioPan1 => {
                let pan = parse_value(property, value)?;
                self.command_slice(slice_of(property), SliceProperty::AudioPan(pan))?;
            }
            PowerOn => debug!("Power state set ignored"),
            StatusNarrow0 | StatusNarrow1 | StatusWide0 | StatusWide1 | Identity | Interlock => {
                return Err(ValidationError::ReadOnly(format!("{property:?}")).into());
            }
        }
        Ok(())
    }

    /// Apply a slice change locally and push it to the radio
    pub fn command_slice(&self, index: usize, property: SliceProperty) -> Result<(), GatewayError> {
        self.apply_slice_property(index, property)?;
        self.link.set_slice_property(index, property);
        Ok(())
    }

    /// Apply a radio-wide change locally and push it to the radio
    pub fn command_radio(&self, property: RadioProperty) -> Result<(), GatewayError> {
        self.apply_radio_property(property)?;
        self.link.set_radio_property(property);
        Ok(())
    }

    pub fn send_cw(&self, text: &str) {
        if !text.is_empty() {
            self.link.send_cw(text);
        }
    }

    pub fn clear_cw(&self) {
        self.link.clear_cw();
    }

    fn select_mode(&self, index: usize, selection: ModeSelection) -> Result<(), GatewayError> {
        check_slice(index)?;
        if !self.state.has_slice(index) {
            return Err(ValidationError::SliceUnavailable(index).into());
        }
        if let Some(lower) = selection.cw_lower {
            if self.state.radio().cw_lower != lower {
                self.command_radio(RadioProperty::CwLower(lower))?;
            }
        }
        self.command_slice(index, SliceProperty::Mode(selection.mode))
    }

    fn with_slice<R>(&self, index: usize, read: impl FnOnce(&SliceState) -> R) -> Result<R, GatewayError> {
        check_slice(index)?;
        let slot = self.state.slice(index);
        let slice = slot
            .state
            .as_ref()
            .ok_or(ValidationError::SliceUnavailable(index))?;
        Ok(read(slice))
    }

    /// Status record text of a slice
    pub fn status_word(&self, index: usize, dialect: Dialect) -> String {
        self.state.slice(index).status.record(dialect).to_string()
    }

    fn present_status_word(&self, index: usize, dialect: Dialect) -> Result<String, GatewayError> {
        let slot = self.state.slice(index);
        if slot.state.is_none() {
            return Err(ValidationError::SliceUnavailable(index).into());
        }
        Ok(slot.status.record(dialect).to_string())
    }

    /// Index of the slice holding receive or transmit focus
    fn focused_slice(&self, focused: impl Fn(&SliceState) -> bool) -> usize {
        (0..SLICE_COUNT)
            .find(|&i| self.state.slice(i).state.as_ref().is_some_and(&focused))
            .unwrap_or(0)
    }

    fn apply_slice_property(&self, index: usize, property: SliceProperty) -> Result<(), GatewayError> {
        check_slice(index)?;
        let radio = self.state.radio_snapshot();
        {
            let mut slot = self.state.slice(index);
            let SliceSlot { state, status } = &mut *slot;
            let slice = state
                .as_mut()
                .ok_or(ValidationError::SliceUnavailable(index))?;

            match property {
                SliceProperty::Frequency(hz) => {
                    status.apply(StatusProperty::Frequency, &hz.to_string())?;
                    slice.frequency_hz = hz;
                }
                SliceProperty::Mode(mode) => {
                    status.apply(StatusProperty::WideMode, mode.wide_code(radio.cw_lower))?;
                    slice.mode = mode;
                }
                SliceProperty::TuneStep(step) => {
                    status.apply(StatusProperty::TuneStep, &step.to_string())?;
                    slice.tune_step = step;
                }
                SliceProperty::RitEnabled(on) => {
                    status.apply(StatusProperty::RitEnabled, flag(on))?;
                    slice.rit_enabled = on;
                }
                SliceProperty::RitOffset(offset) => {
                    let offset = offset.clamp(-MAX_OFFSET_HZ, MAX_OFFSET_HZ);
                    status.apply(StatusProperty::RitOffset, &offset.to_string())?;
                    slice.rit_offset = offset;
                }
                SliceProperty::XitEnabled(on) => {
                    status.apply(StatusProperty::XitEnabled, flag(on))?;
                    slice.xit_enabled = on;
                }
                SliceProperty::XitOffset(offset) => {
                    slice.xit_offset = offset.clamp(-MAX_OFFSET_HZ, MAX_OFFSET_HZ);
                }
                SliceProperty::Active(on) => slice.active_rx = on,
                SliceProperty::Transmit(on) => slice.active_tx = on,
                SliceProperty::AudioGain(gain) => slice.audio_gain = gain.min(100),
                SliceProperty::AudioPan(pan) => slice.audio_pan = pan.min(100),
                SliceProperty::AudioMute(mute) => slice.audio_mute = mute,
                SliceProperty::Filter(passband) => slice.filter = passband,
                SliceProperty::Agc(agc) => slice.agc = agc,
            }
        }

        match property {
            SliceProperty::Frequency(hz) if radio.auto_info > 0 => {
                let prefix = if index == 0 { "FA" } else { "FB" };
                let _ = self.auto_info_tx.send(format!("{prefix}{hz:011};"));
            }
            SliceProperty::Active(true) => self.move_focus(index, StatusProperty::ActiveRx)?,
            SliceProperty::Transmit(true) => self.move_focus(index, StatusProperty::ActiveTx)?,
            _ => {}
        }
        Ok(())
    }

    /// Clear focus on the other slice and publish the new focus
    fn move_focus(&self, index: usize, focus: StatusProperty) -> Result<(), GatewayError> {
        for other in (0..SLICE_COUNT).filter(|&i| i != index) {
            if let Some(slice) = self.state.slice(other).state.as_mut() {
                match focus {
                    StatusProperty::ActiveTx => slice.active_tx = false,
                    _ => slice.active_rx = false,
                }
            }
        }
        self.publish_focus()
    }

    /// Write active-rx/tx into every slice's status words
    ///
    /// In SO2R operation both are written as zero.
    fn publish_focus(&self) -> Result<(), GatewayError> {
        let so2r = self.state.radio().so2r;
        let (rx, tx) = if so2r {
            (0, 0)
        } else {
            (
                self.focused_slice(|s| s.active_rx),
                self.focused_slice(|s| s.active_tx),
            )
        };
        for index in 0..SLICE_COUNT {
            let mut slot = self.state.slice(index);
            slot.status.apply(StatusProperty::ActiveRx, &rx.to_string())?;
            slot.status.apply(StatusProperty::ActiveTx, &tx.to_string())?;
        }
        Ok(())
    }

    fn apply_radio_property(&self, property: RadioProperty) -> Result<(), GatewayError> {
        {
            let mut radio = self.state.radio();
            match property {
                RadioProperty::Mox(on) => radio.mox = on,
                RadioProperty::CwLower(lower) => radio.cw_lower = lower,
                RadioProperty::CwSpeed(wpm) => radio.cw_speed = wpm,
                RadioProperty::CwPitch(hz) => radio.cw_pitch = hz,
                RadioProperty::RfPower(power) => radio.rf_power = power.min(100),
            }
        }

        match property {
            RadioProperty::Mox(on) => {
                for index in 0..SLICE_COUNT {
                    self.state
                        .slice(index)
                        .status
                        .apply(StatusProperty::Mox, flag(on))?;
                }
            }
            RadioProperty::CwLower(lower) => {
                let code = DemodMode::Cw.wide_code(lower);
                for index in 0..SLICE_COUNT {
                    let mut slot = self.state.slice(index);
                    if slot.state.as_ref().is_some_and(|s| s.mode == DemodMode::Cw) {
                        slot.status.apply(StatusProperty::WideMode, code)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Mark SO2R operation on or off and republish focus
    pub fn set_so2r(&self, on: bool) {
        self.state.radio().so2r = on;
        if let Err(e) = self.publish_focus() {
            warn!("Failed to republish focus: {}", e);
        }
    }

    /// Install a slice; focus flags of a slice already present are kept
    fn add_slice(&self, index: usize, mut slice: SliceState) -> Result<(), GatewayError> {
        check_slice(index)?;
        let radio = self.state.radio_snapshot();
        let mut slot = self.state.slice(index);
        if let Some(existing) = &slot.state {
            slice.active_rx = existing.active_rx;
            slice.active_tx = existing.active_tx;
        }
        let snapshot = slice.snapshot(&radio);
        slot.status.rebuild(&snapshot)?;
        slot.state = Some(slice);
        drop(slot);
        info!("Slice {} available", index);
        self.publish_focus()
    }

    /// Fold a radio notification into the canonical state
    pub fn handle_notification(&self, notification: RadioNotification) {
        let result = match notification {
            RadioNotification::SliceAdded { index, state } => self.add_slice(index, state),
            RadioNotification::SliceRemoved { index } => check_slice(index)
                .map(|()| {
                    self.state.slice(index).state = None;
                    info!("Slice {} removed", index);
                })
                .map_err(GatewayError::from),
            RadioNotification::SliceChanged { index, property } => {
                self.apply_slice_property(index, property)
            }
            RadioNotification::RadioChanged(property) => self.apply_radio_property(property),
            RadioNotification::CwCharSent => {
                let _ = self.keyer_tx.send(KeyerNotification::CharSent);
                Ok(())
            }
            RadioNotification::CwBufferErased => {
                let _ = self.keyer_tx.send(KeyerNotification::BufferErased);
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("Radio notification not applied: {}", e);
        }
    }

    /// Make sure slice `index` exists, creating it on the radio if needed
    ///
    /// Returns false if the radio does not confirm the slice in time.
    pub async fn ensure_slice(&self, index: usize) -> bool {
        if index >= SLICE_COUNT {
            return false;
        }
        if self.state.has_slice(index) {
            return true;
        }

        let template = self.state.slice_state(0).unwrap_or_default();
        info!("Creating slice {}", index);
        self.link
            .create_slice(index, template.frequency_hz, template.mode);

        let link = &self.link;
        if !self
            .config
            .slice_ack_poll
            .wait_until(|| link.slice_acknowledged(index))
            .await
        {
            warn!("Slice {} was not confirmed by the radio", index);
            return false;
        }

        if !self.state.has_slice(index) {
            let slice = SliceState::new(template.frequency_hz, template.mode);
            if let Err(e) = self.add_slice(index, slice) {
                warn!("Slice {} could not be seeded: {}", index, e);
                return false;
            }
        }
        true
    }

    /// Wait for the transmit interlock to report ready
    pub async fn wait_for_interlock_ready(&self) -> bool {
        let link = &self.link;
        self.config
            .interlock_poll
            .wait_until(|| link.interlock_state() == InterlockState::Ready)
            .await
    }
}

fn slice_of(property: Property) -> usize {
    property.slice().unwrap_or(0)
}

/// Drain radio notifications into the processor until the link goes away
pub async fn run_notification_pump(
    processor: Arc<CommandProcessor>,
    mut notifications: mpsc::UnboundedReceiver<RadioNotification>,
) {
    info!("Radio notification pump started");
    while let Some(notification) = notifications.recv().await {
        processor.handle_notification(notification);
    }
    info!("Radio notification pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLink {
        slice_sets: Mutex<Vec<(usize, SliceProperty)>>,
        radio_sets: Mutex<Vec<RadioProperty>>,
        cw: Mutex<Vec<String>>,
        created: Mutex<Vec<usize>>,
        acknowledge: AtomicBool,
    }

    impl RadioLink for RecordingLink {
        fn set_slice_property(&self, index: usize, property: SliceProperty) {
            self.slice_sets.lock().unwrap().push((index, property));
        }

        fn set_radio_property(&self, property: RadioProperty) {
            self.radio_sets.lock().unwrap().push(property);
        }

        fn send_cw(&self, text: &str) {
            self.cw.lock().unwrap().push(text.to_string());
        }

        fn clear_cw(&self) {}

        fn create_slice(&self, index: usize, _frequency_hz: u64, _mode: DemodMode) {
            self.created.lock().unwrap().push(index);
        }

        fn remove_slice(&self, _index: usize) {}

        fn interlock_state(&self) -> InterlockState {
            InterlockState::Ready
        }

        fn slice_acknowledged(&self, _index: usize) -> bool {
            self.acknowledge.load(Ordering::SeqCst)
        }
    }

    fn quick_config() -> ProcessorConfig {
        ProcessorConfig {
            interlock_poll: PollConfig::new(3, Duration::from_millis(1)),
            slice_ack_poll: PollConfig::new(3, Duration::from_millis(1)),
        }
    }

    fn processor_with_slice() -> (CommandProcessor, Arc<RecordingLink>) {
        let link = Arc::new(RecordingLink::default());
        let processor = CommandProcessor::new(
            DescriptorTable::builtin(),
            RadioState::default(),
            link.clone(),
            quick_config(),
        );
        processor.handle_notification(RadioNotification::SliceAdded {
            index: 0,
            state: SliceState::new(14_250_000, DemodMode::Usb),
        });
        (processor, link)
    }

    #[tokio::test]
    async fn test_frequency_get_both_dialects() {
        let (processor, _) = processor_with_slice();
        assert_eq!(processor.execute("FA;").await, "FA00014250000;");
        assert_eq!(processor.execute("ZZFA;").await, "ZZFA00014250000;");
        assert_eq!(processor.get(Property::Freq0).unwrap(), "14250000");
    }

    #[tokio::test]
    async fn test_frequency_set_reaches_link_and_status() {
        let (processor, link) = processor_with_slice();
        assert_eq!(processor.execute("FA00007074000;").await, "");
        assert_eq!(
            link.slice_sets.lock().unwrap().last(),
            Some(&(0, SliceProperty::Frequency(7_074_000)))
        );
        assert!(processor
            .status_word(0, Dialect::Narrow)
            .starts_with("00007074000"));
        assert!(processor
            .status_word(0, Dialect::Wide)
            .starts_with("00007074000"));
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_commands() {
        let (processor, _) = processor_with_slice();
        assert_eq!(processor.execute("QQ;").await, ERROR_TOKEN);
        assert_eq!(processor.execute("FA123;").await, ERROR_TOKEN);
        assert_eq!(processor.execute("MD0;").await, ERROR_TOKEN);
        assert_eq!(processor.execute("IF1;").await, ERROR_TOKEN);
        assert_eq!(processor.execute(";").await, ERROR_TOKEN);
    }

    #[tokio::test]
    async fn test_missing_slice_get_fails() {
        let (processor, _) = processor_with_slice();
        assert_eq!(processor.execute("FB;").await, ERROR_TOKEN);
        assert_eq!(processor.execute("ZZME;").await, ERROR_TOKEN);
        assert_eq!(processor.execute("IX;").await, ERROR_TOKEN);
        assert_eq!(processor.execute("ZZIX;").await, ERROR_TOKEN);
        assert_eq!(processor.execute("ZZIF;").await.len(), 4 + 36 + 1);
    }

    #[tokio::test]
    async fn test_mode_set_translates_between_dialects() {
        let (processor, link) = processor_with_slice();
        assert_eq!(processor.execute("MD7;").await, "");
        assert!(link
            .radio_sets
            .lock()
            .unwrap()
            .contains(&RadioProperty::CwLower(true)));
        assert_eq!(processor.execute("ZZMD;").await, "ZZMD03;");
        assert_eq!(processor.execute("MD;").await, "MD7;");

        assert_eq!(processor.execute("ZZMD04;").await, "");
        assert_eq!(processor.execute("MD;").await, "MD3;");
    }

    #[tokio::test]
    async fn test_unmapped_mode_is_error() {
        let (processor, _) = processor_with_slice();
        assert_eq!(processor.execute("ZZMD99;").await, ERROR_TOKEN);
        assert_eq!(processor.execute("ZZMD20;").await, "");
        // FDV has no filter table
        assert_eq!(processor.execute("ZZFI;").await, ERROR_TOKEN);
    }

    #[tokio::test]
    async fn test_rit_commands() {
        let (processor, _) = processor_with_slice();
        processor.execute("RU;").await;
        assert_eq!(processor.execute("ZZRF;").await, "ZZRF+00050;");
        processor.execute("RD00120;").await;
        assert_eq!(processor.execute("ZZRF;").await, "ZZRF-00070;");
        processor.execute("ZZRF+00125;").await;
        assert_eq!(processor.execute("ZZRF;").await, "ZZRF+00125;");
        processor.execute("RC;").await;
        assert_eq!(processor.execute("ZZRF;").await, "ZZRF+00000;");
    }

    #[tokio::test]
    async fn test_transmit_and_receive() {
        let (processor, _) = processor_with_slice();
        processor.execute("TX;").await;
        assert_eq!(processor.execute("ZZTX;").await, "ZZTX1;");
        processor.execute("RX;").await;
        assert_eq!(processor.execute("ZZTX;").await, "ZZTX0;");
        processor.execute("TX0;").await;
        assert_eq!(processor.get(Property::Mox).unwrap(), "1");
    }

    #[tokio::test]
    async fn test_filter_cut_round_trip() {
        let (processor, link) = processor_with_slice();
        assert_eq!(processor.execute("SH;").await, "SH07;");
        assert_eq!(processor.execute("SL;").await, "SL02;");
        processor.execute("ZZFI00;").await;
        assert!(matches!(
            link.slice_sets.lock().unwrap().last(),
            Some(&(0, SliceProperty::Filter(_)))
        ));
        assert_eq!(processor.execute("ZZFI;").await, "ZZFI00;");
    }

    #[tokio::test]
    async fn test_agc_and_indexed_gain() {
        let (processor, _) = processor_with_slice();
        processor.execute("GT004;").await;
        assert_eq!(processor.execute("ZZGT;").await, "ZZGT4;");
        processor.execute("AG0075;").await;
        assert_eq!(processor.execute("AG0;").await, "AG0075;");
        assert_eq!(processor.execute("ZZAG;").await, "ZZAG075;");
        assert_eq!(processor.execute("AG1;").await, ERROR_TOKEN);
    }

    #[tokio::test]
    async fn test_cw_send_strips_separator() {
        let (processor, link) = processor_with_slice();
        assert_eq!(processor.execute("KY CQ TEST;").await, "");
        assert_eq!(link.cw.lock().unwrap().as_slice(), ["CQ TEST".to_string()]);
    }

    #[tokio::test]
    async fn test_auto_info_broadcast() {
        let (processor, _) = processor_with_slice();
        let mut rx = processor.subscribe_auto_info();
        processor.execute("FA00007000000;").await;
        assert!(rx.try_recv().is_err());

        processor.execute("AI2;").await;
        processor.handle_notification(RadioNotification::SliceChanged {
            index: 0,
            property: SliceProperty::Frequency(7_001_000),
        });
        assert_eq!(rx.try_recv().unwrap(), "FA00007001000;");
    }

    #[tokio::test]
    async fn test_focus_and_so2r_status() {
        let (processor, _) = processor_with_slice();
        processor.handle_notification(RadioNotification::SliceAdded {
            index: 1,
            state: SliceState::new(7_020_000, DemodMode::Cw),
        });
        processor.execute("FR1;").await;
        assert_eq!(processor.execute("FR;").await, "FR1;");
        let record = cat_protocol::StatusRecord::decode(
            Dialect::Narrow,
            &processor.status_word(0, Dialect::Narrow),
        )
        .unwrap();
        assert_eq!(record.active_rx, 1);

        processor.set_so2r(true);
        let record = cat_protocol::StatusRecord::decode(
            Dialect::Wide,
            &processor.status_word(1, Dialect::Wide),
        )
        .unwrap();
        assert_eq!(record.active_rx, 0);
    }

    #[tokio::test]
    async fn test_ensure_slice_times_out_without_ack() {
        let (processor, link) = processor_with_slice();
        assert!(!processor.ensure_slice(1).await);
        assert_eq!(link.created.lock().unwrap().as_slice(), [1]);
        assert_eq!(processor.execute("FT1;").await, ERROR_TOKEN);

        link.acknowledge.store(true, Ordering::SeqCst);
        assert_eq!(processor.execute("FT1;").await, "");
        assert!(processor.state().has_slice(1));
        assert_eq!(processor.execute("FT;").await, "FT1;");
    }

    #[tokio::test]
    async fn test_reannounced_slice_keeps_focus() {
        let (processor, link) = processor_with_slice();
        link.acknowledge.store(true, Ordering::SeqCst);
        assert_eq!(processor.execute("FT1;").await, "");

        processor.handle_notification(RadioNotification::SliceAdded {
            index: 1,
            state: SliceState::new(7_020_000, DemodMode::Cw),
        });
        assert_eq!(processor.execute("FT;").await, "FT1;");
        assert_eq!(processor.execute("FB;").await, "FB00007020000;");
    }

    #[tokio::test]
    async fn test_read_only_and_power() {
        let (processor, _) = processor_with_slice();
        assert_eq!(processor.execute("ID;").await, "ID904;");
        assert_eq!(processor.execute("PS;").await, "PS1;");
        assert_eq!(processor.execute("PS0;").await, "");
        assert_eq!(processor.execute("ZZIF;").await.len(), 4 + 36 + 1);
    }
}
