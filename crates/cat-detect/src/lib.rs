//! Virtual Port Discovery Library
//!
//! This crate provides serial port enumeration and the provider seam the
//! gateway uses to create, remove and open virtual port pairs.
//!
//! # Example
//!
//! ```rust,no_run
//! use cat_detect::{PortProvider, SystemPortProvider};
//!
//! let provider = SystemPortProvider::new("COM{n}", 9600);
//! let used = provider.used_numbers().unwrap();
//!
//! for number in used {
//!     println!("In use: {}", provider.port_name(number));
//! }
//! ```

pub mod error;
pub mod provider;
pub mod scanner;

pub use error::DetectError;
pub use provider::{BoxedPortIo, ModemLines, PortIo, PortProvider, SystemPortProvider};
pub use scanner::{port_number, PortScanner, SerialPortInfo};
