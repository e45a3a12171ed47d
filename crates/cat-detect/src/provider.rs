//! Port provider
//!
//! The gateway never talks to a pair driver or the OS port layer directly.
//! It goes through [`PortProvider`], which enumerates used port numbers,
//! creates and removes virtual pairs, and opens the gateway end of a pair.

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::error::DetectError;
use crate::scanner::PortScanner;

/// Byte stream of an open port
pub trait PortIo: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> PortIo for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Boxed byte stream as returned by a provider
pub type BoxedPortIo = Box<dyn PortIo>;

/// Modem status inputs of an open port
pub trait ModemLines: Send + 'static {
    /// CTS input level
    fn clear_to_send(&mut self) -> Result<bool, DetectError>;
    /// DSR input level
    fn data_set_ready(&mut self) -> Result<bool, DetectError>;
}

impl ModemLines for SerialStream {
    fn clear_to_send(&mut self) -> Result<bool, DetectError> {
        Ok(self.read_clear_to_send()?)
    }

    fn data_set_ready(&mut self) -> Result<bool, DetectError> {
        Ok(self.read_data_set_ready()?)
    }
}

/// Access to the host's ports and virtual pair driver
pub trait PortProvider: Send + Sync {
    /// Port numbers already present on the host
    fn used_numbers(&self) -> Result<Vec<u32>, DetectError>;

    /// Create the pair `low`/`high`
    fn create_pair(&self, low: u32, high: u32) -> Result<(), DetectError>;

    /// Remove the pair `low`/`high`
    fn remove_pair(&self, low: u32, high: u32) -> Result<(), DetectError>;

    /// Open a port as a byte stream
    fn open(&self, number: u32) -> Result<BoxedPortIo, DetectError>;

    /// Open a port for reading its modem status lines only
    fn open_lines(&self, number: u32) -> Result<Box<dyn ModemLines>, DetectError>;

    /// Host name of a port number
    fn port_name(&self, number: u32) -> String;
}

/// Provider backed by the host's serial ports
///
/// No pair driver is bundled. A pair counts as created when both of its
/// ports already exist (made by an external null-modem driver or `socat`),
/// and removal leaves the ports in place.
pub struct SystemPortProvider {
    name_template: String,
    baud_rate: u32,
    scanner: PortScanner,
}

impl SystemPortProvider {
    /// `name_template` contains `{n}` where the port number goes (`COM{n}`)
    pub fn new(name_template: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            name_template: name_template.into(),
            baud_rate,
            scanner: PortScanner::new(),
        }
    }

    fn exists(&self, number: u32, used: &[u32]) -> bool {
        used.contains(&number) || Path::new(&self.port_name(number)).exists()
    }

    fn open_stream(&self, number: u32) -> Result<SerialStream, DetectError> {
        let name = self.port_name(number);
        debug!("Opening {} at {} baud", name, self.baud_rate);
        tokio_serial::new(&name, self.baud_rate)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(|e| DetectError::OpenFailed {
                port: name,
                reason: e.to_string(),
            })
    }
}

impl PortProvider for SystemPortProvider {
    fn used_numbers(&self) -> Result<Vec<u32>, DetectError> {
        self.scanner.used_numbers()
    }

    fn create_pair(&self, low: u32, high: u32) -> Result<(), DetectError> {
        let used = self.used_numbers()?;
        if self.exists(low, &used) && self.exists(high, &used) {
            info!("Using existing pair {}/{}", self.port_name(low), self.port_name(high));
            return Ok(());
        }
        Err(DetectError::Unsupported(format!(
            "no pair driver; create {} and {} externally",
            self.port_name(low),
            self.port_name(high)
        )))
    }

    fn remove_pair(&self, low: u32, high: u32) -> Result<(), DetectError> {
        info!(
            "Released pair {}/{} (ports are managed externally)",
            self.port_name(low),
            self.port_name(high)
        );
        Ok(())
    }

    fn open(&self, number: u32) -> Result<BoxedPortIo, DetectError> {
        Ok(Box::new(self.open_stream(number)?))
    }

    fn open_lines(&self, number: u32) -> Result<Box<dyn ModemLines>, DetectError> {
        Ok(Box::new(self.open_stream(number)?))
    }

    fn port_name(&self, number: u32) -> String {
        self.name_template.replace("{n}", &number.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_name_template() {
        let provider = SystemPortProvider::new("COM{n}", 9600);
        assert_eq!(provider.port_name(14), "COM14");

        let provider = SystemPortProvider::new("/dev/ttyCAT{n}", 9600);
        assert_eq!(provider.port_name(4), "/dev/ttyCAT4");
    }

    #[test]
    fn test_missing_pair_is_unsupported() {
        let provider = SystemPortProvider::new("/nonexistent/flexcat-test{n}", 9600);
        assert!(matches!(
            provider.create_pair(250, 260),
            Err(DetectError::Unsupported(_)) | Err(DetectError::EnumerationFailed(_))
        ));
        assert!(provider.remove_pair(250, 260).is_ok());
    }
}
