//! CAT Translation Gateway
//!
//! This crate lets station software that speaks different CAT dialects
//! share one networked radio at the same time.
//!
//! # Architecture
//!
//! Every client port is one end of a virtual port pair. The gateway opens
//! the other end and runs it as a set of tasks:
//!
//! - **Reader**: extracts frames and queues them per port
//! - **Dispatcher**: drains the queue on a fixed tick, in FIFO order
//! - **Writer**: writes replies and unsolicited frames
//!
//! Queued frames are routed by the port's dialect tag. CAT text (narrow or
//! wide, optionally SO2R-swapped) goes to the [`CommandProcessor`], which
//! keeps one canonical state per slice and talks to the radio through a
//! [`RadioLink`]. OTRSP frames go to the OTRSP interpreter. WinKeyer ports
//! run a binary decoder instead of the queue, and PTT ports only watch
//! their modem lines.
//!
//! All events (port lifecycle, traffic) emit through a unified
//! [`GatewayEvent`] stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cat_gateway::{DescriptorTable, GatewayConfig, GatewayContext, RadioLink};
//!
//! # async fn run(link: Arc<dyn RadioLink>) {
//! let ctx = GatewayContext::new(GatewayConfig::default(), DescriptorTable::builtin(), link);
//! assert_eq!(ctx.processor.execute("QQ;").await, "?;");
//! # }
//! ```

pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod otrsp;
pub mod port;
pub mod port_manager;
pub mod processor;
pub mod radio_link;
pub mod state;
pub mod tcp;
pub mod winkeyer;

pub use context::{GatewayConfig, GatewayContext};
pub use descriptor::{CommandDescriptor, DescriptorTable, Formatter, Property};
pub use dispatcher::{Dispatcher, PendingCommand, PortKind};
pub use error::{GatewayError, ValidationError, ERROR_TOKEN};
pub use events::GatewayEvent;
pub use otrsp::OtrspInterpreter;
pub use port::{PortHandle, PttPins};
pub use port_manager::{
    allocate_pair, PortInfo, PortManager, PortSpec, RadioAssignment, MAX_PORT, PAIR_OFFSET,
};
pub use processor::{CommandProcessor, PollConfig, ProcessorConfig};
pub use radio_link::{
    InterlockState, KeyerNotification, RadioLink, RadioNotification, RadioProperty, SliceProperty,
};
pub use state::{RadioState, SliceState};
pub use tcp::{run_tcp_endpoint, EndpointCommand};
