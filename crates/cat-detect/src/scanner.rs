//! Host port listing
//!
//! Virtual pairs are numbered like the host's own ports, so before a pair is
//! created the scanner reports which numbers are taken.

use serialport::{available_ports, SerialPortType};
use tracing::debug;

use crate::error::DetectError;

/// One port present on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Host name (`COM14`, `/dev/ttyCAT14`)
    pub port: String,
    /// Trailing number of the name
    pub number: Option<u32>,
    /// USB-backed port rather than a virtual or onboard one
    pub usb: bool,
}

impl SerialPortInfo {
    fn new(port: String, port_type: &SerialPortType) -> Self {
        Self {
            number: port_number(&port),
            usb: matches!(port_type, SerialPortType::UsbPort(_)),
            port,
        }
    }
}

/// Parse the trailing decimal number of a port name
///
/// `COM14` and `/dev/ttyCAT14` both give 14; a name without trailing digits
/// gives `None`.
pub fn port_number(name: &str) -> Option<u32> {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    name[name.len() - digits..].parse().ok()
}

/// Lists the host's serial ports
///
/// Names containing one of the `ignore` fragments are left out; macOS
/// Bluetooth ports are ignored by default.
#[derive(Debug, Clone)]
pub struct PortScanner {
    ignore: Vec<String>,
}

impl PortScanner {
    pub fn new() -> Self {
        Self::ignoring(["Bluetooth"])
    }

    pub fn ignoring<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignore: fragments.into_iter().map(Into::into).collect(),
        }
    }

    /// Ports on the host, ordered by number
    pub fn ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        let mut ports: Vec<_> = available_ports()
            .map_err(|e| DetectError::EnumerationFailed(e.to_string()))?
            .into_iter()
            .map(|p| SerialPortInfo::new(p.port_name, &p.port_type))
            .filter(|p| !self.ignored(&p.port))
            .collect();
        ports.sort_by_key(|p| p.number);
        debug!("{} host port(s)", ports.len());
        Ok(ports)
    }

    /// Taken port numbers, sorted and deduplicated
    pub fn used_numbers(&self) -> Result<Vec<u32>, DetectError> {
        let mut numbers: Vec<u32> = self.ports()?.into_iter().filter_map(|p| p.number).collect();
        numbers.dedup();
        Ok(numbers)
    }

    fn ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|f| name.contains(f.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}
