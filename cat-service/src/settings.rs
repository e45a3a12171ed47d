//! Service settings

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use cat_gateway::{
    GatewayConfig, PollConfig, PortKind, PortSpec, ProcessorConfig, RadioAssignment, RadioState,
    PAIR_OFFSET,
};
use cat_sim::SimRadioConfig;
use serde::{Deserialize, Serialize};

/// Attempt/interval pair for a bounded wait
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollSettings {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl PollSettings {
    fn to_config(self) -> PollConfig {
        PollConfig::new(self.attempts, Duration::from_millis(self.interval_ms))
    }
}

/// TCP CAT endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TcpEndpointSettings {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Default for TcpEndpointSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0".to_string(),
            port: 5002,
        }
    }
}

impl TcpEndpointSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn default_port_template() -> String {
    if cfg!(windows) {
        "COM{n}".to_string()
    } else {
        "/dev/ttyCAT{n}".to_string()
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Dispatch tick period of every port
    pub dispatch_interval_ms: u64,
    /// Wait for the transmit interlock before an OTRSP TX switch
    pub interlock_poll: PollSettings,
    /// Wait for the radio to confirm a created slice
    pub slice_ack_poll: PollSettings,
    pub tcp_endpoint: TcpEndpointSettings,
    /// Port name with `{n}` where the number goes
    pub port_name_template: String,
    pub baud_rate: u32,
    /// Ports to provision, per radio serial
    pub radios: Vec<RadioAssignment>,
    /// JSON file replacing the built-in command descriptor table
    pub descriptor_file: Option<PathBuf>,
    pub cw_pitch_hz: u16,
    pub digu_offset_hz: i32,
    pub digl_offset_hz: i32,
    pub rtty_shift_hz: i32,
    /// Simulated radio used as the radio link
    pub simulation: SimRadioConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dispatch_interval_ms: 10,
            interlock_poll: PollSettings {
                attempts: 50,
                interval_ms: 5,
            },
            slice_ack_poll: PollSettings {
                attempts: 300,
                interval_ms: 10,
            },
            tcp_endpoint: TcpEndpointSettings::default(),
            port_name_template: default_port_template(),
            baud_rate: 9600,
            radios: Vec::new(),
            descriptor_file: None,
            cw_pitch_hz: 600,
            digu_offset_hz: 1500,
            digl_offset_hz: 2210,
            rtty_shift_hz: 170,
            simulation: SimRadioConfig::default(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for flexcat
    /// Uses $XDG_CONFIG_HOME/flexcat, falls back to ~/.config/flexcat
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("flexcat"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("flexcat"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk; a missing or corrupt file yields defaults
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path().context("Could not determine settings path")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Record a port under a radio
    ///
    /// An entry with the same number is replaced, and a new master drops
    /// the previous one, matching the port manager.
    pub fn remember_port(&mut self, serial: &str, spec: PortSpec) {
        let master = spec.kind == PortKind::Master;
        for radio in &mut self.radios {
            radio
                .ports
                .retain(|p| p.number != spec.number && !(master && p.kind == PortKind::Master));
        }

        match self.radios.iter_mut().find(|r| r.serial == serial) {
            Some(radio) => radio.ports.push(spec),
            None => self.radios.push(RadioAssignment {
                serial: serial.to_string(),
                ports: vec![spec],
            }),
        }
    }

    /// Forget a port by either number of its pair; true if one was recorded
    pub fn forget_port(&mut self, number: u32) -> bool {
        let mut found = false;
        for radio in &mut self.radios {
            let before = radio.ports.len();
            radio
                .ports
                .retain(|p| p.number != number && p.number + PAIR_OFFSET != number);
            found |= radio.ports.len() != before;
        }
        self.radios.retain(|r| !r.ports.is_empty());
        found
    }

    /// Gateway configuration built from these settings
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            dispatch_interval: Duration::from_millis(self.dispatch_interval_ms.max(1)),
            processor: ProcessorConfig {
                interlock_poll: self.interlock_poll.to_config(),
                slice_ack_poll: self.slice_ack_poll.to_config(),
            },
            radio: RadioState {
                cw_pitch: self.cw_pitch_hz,
                digu_offset: self.digu_offset_hz,
                digl_offset: self.digl_offset_hz,
                rtty_shift: self.rtty_shift_hz,
                ..RadioState::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"baud_rate": 19200}"#).unwrap();
        assert_eq!(settings.baud_rate, 19200);
        assert_eq!(settings.dispatch_interval_ms, 10);
        assert_eq!(settings.tcp_endpoint.address(), "0.0.0.0:5002");
        assert!(settings.radios.is_empty());
    }

    #[test]
    fn test_radio_assignments_round_trip() {
        let mut settings = Settings::default();
        settings.radios.push(RadioAssignment {
            serial: "1234-5678".to_string(),
            ports: vec![PortSpec::new(4, PortKind::Master), PortSpec::new(5, PortKind::So2r)],
        });

        let json = serde_json::to_string(&settings).unwrap();
        let loaded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_remember_and_forget_ports() {
        let mut settings = Settings::default();
        settings.remember_port("A", PortSpec::new(4, PortKind::Master));
        settings.remember_port("A", PortSpec::new(5, PortKind::Otrsp));
        settings.remember_port("B", PortSpec::new(6, PortKind::Master));

        assert_eq!(settings.radios.len(), 2);
        assert_eq!(settings.radios[0].ports, vec![PortSpec::new(5, PortKind::Otrsp)]);
        assert_eq!(settings.radios[1].ports, vec![PortSpec::new(6, PortKind::Master)]);

        settings.remember_port("A", PortSpec::new(5, PortKind::So2r));
        assert_eq!(settings.radios[0].ports, vec![PortSpec::new(5, PortKind::So2r)]);

        assert!(settings.forget_port(15));
        assert_eq!(settings.radios.len(), 1);
        assert!(!settings.forget_port(15));
    }

    #[test]
    fn test_gateway_config() {
        let settings = Settings {
            dispatch_interval_ms: 0,
            cw_pitch_hz: 700,
            ..Settings::default()
        };
        let config = settings.gateway_config();
        assert_eq!(config.dispatch_interval, Duration::from_millis(1));
        assert_eq!(config.radio.cw_pitch, 700);
        assert_eq!(config.processor.slice_ack_poll.attempts, 300);
    }
}
