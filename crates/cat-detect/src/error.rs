//! Error types for virtual port discovery and provisioning

use thiserror::Error;

/// Errors that can occur while enumerating, provisioning or opening ports
#[derive(Debug, Error)]
pub enum DetectError {
    /// The host refused to list its serial ports
    #[error("port listing failed: {0}")]
    EnumerationFailed(String),

    /// A virtual port could not be opened
    #[error("cannot open {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// The pair driver refused to create or remove a pair
    #[error("virtual pair {low}/{high} failed: {reason}")]
    PairFailed { low: u32, high: u32, reason: String },

    /// One end of a requested pair already exists
    #[error("port {0} already exists")]
    PortBusy(String),

    /// No virtual pair driver is available on this host
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("serial: {0}")]
    SerialPort(#[from] serialport::Error),
}
