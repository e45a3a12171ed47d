//! Traffic log
//!
//! Subscribes to the gateway event stream and writes it to the log. Traffic
//! goes out at debug level, lifecycle events at info.

use cat_gateway::GatewayEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Printable form of CAT traffic; binary bytes are shown as hex
pub fn format_data(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        match b {
            b'\r' => out.push_str("\\r"),
            b'\n' => out.push_str("\\n"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("<{:02X}>", b)),
        }
    }
    out
}

fn port_label(port: u32) -> String {
    if port == cat_gateway::tcp::TCP_PORT_TAG {
        "tcp".to_string()
    } else {
        port.to_string()
    }
}

/// Log one event
pub fn log_event(event: &GatewayEvent) {
    match event {
        GatewayEvent::DataIn { port, data } => {
            debug!("[{}] IN  {}", port_label(*port), format_data(data))
        }
        GatewayEvent::DataOut { port, data } => {
            debug!("[{}] OUT {}", port_label(*port), format_data(data))
        }
        GatewayEvent::PortOpened { number, kind } => {
            info!("Port {} open ({})", number, kind.name())
        }
        GatewayEvent::PortClosed { number } => info!("Port {} closed", number),
        GatewayEvent::ClientConnected { peer } => info!("TCP client {} connected", peer),
        GatewayEvent::ClientDisconnected { peer } => info!("TCP client {} disconnected", peer),
        GatewayEvent::Error { source, message } => warn!("{}: {}", source, message),
    }
}

/// Log events until the gateway's event channel closes
pub async fn run_traffic_log(mut events: broadcast::Receiver<GatewayEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => log_event(&event),
            Err(RecvError::Lagged(missed)) => warn!("Traffic log skipped {} events", missed),
            Err(RecvError::Closed) => break,
        }
    }
}
