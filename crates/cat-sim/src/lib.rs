//! Simulated Radio Link
//!
//! This crate provides an in-memory radio for running the gateway without
//! hardware. It includes:
//!
//! - **SimRadio**: a [`RadioLink`](cat_gateway::RadioLink) that keeps its own
//!   slice state and reports radio-side changes
//! - **Keyer task**: paces CW text and reports each sent character
//!
//! # Example
//!
//! ```rust
//! use cat_gateway::{DescriptorTable, GatewayConfig, GatewayContext};
//! use cat_sim::{SimRadio, SimRadioConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (radio, notifications) = SimRadio::start(SimRadioConfig::default());
//! let ctx = GatewayContext::new(GatewayConfig::default(), DescriptorTable::builtin(), radio.clone());
//! ctx.spawn_notification_pump(notifications);
//!
//! radio.tune(0, 7_074_000);
//! # }
//! ```

pub mod keyer;
pub mod radio;

pub use keyer::{run_sim_keyer, KeyerCommand};
pub use radio::{SimRadio, SimRadioConfig, SimSlice};
