//! Unified event stream for the gateway
//!
//! Port tasks, the TCP endpoint and the port manager report lifecycle and
//! traffic through a single broadcast channel. Observers (the service's
//! traffic log, tests) subscribe; senders never wait on them.

use crate::dispatcher::PortKind;

/// Unified event enum for all gateway activity
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    // -------------------------------------------------------------------------
    // Port lifecycle events
    // -------------------------------------------------------------------------
    /// A port was opened by the gateway
    PortOpened {
        /// Gateway-side port number (N+10)
        number: u32,
        /// Dialect tag
        kind: PortKind,
    },

    /// A port was closed
    PortClosed {
        /// Gateway-side port number (N+10)
        number: u32,
    },

    // -------------------------------------------------------------------------
    // Traffic events (for traffic monitor)
    // -------------------------------------------------------------------------
    /// Data received from a client
    DataIn {
        /// Port number, or 0 for TCP clients
        port: u32,
        /// Raw data bytes
        data: Vec<u8>,
    },

    /// Data written to a client
    DataOut {
        /// Port number, or 0 for TCP clients
        port: u32,
        /// Raw data bytes
        data: Vec<u8>,
    },

    // -------------------------------------------------------------------------
    // TCP endpoint events
    // -------------------------------------------------------------------------
    /// A TCP client connected
    ClientConnected {
        /// Peer address
        peer: String,
    },

    /// A TCP client disconnected
    ClientDisconnected {
        /// Peer address
        peer: String,
    },

    /// An absorbed error
    Error {
        /// Source of the error
        source: String,
        /// Error message
        message: String,
    },
}

impl GatewayEvent {
    /// Check if this is a traffic event (for traffic monitor filtering)
    pub fn is_traffic(&self) -> bool {
        matches!(
            self,
            GatewayEvent::DataIn { .. } | GatewayEvent::DataOut { .. }
        )
    }

    /// Get the port number if this event is associated with a port
    pub fn port(&self) -> Option<u32> {
        match self {
            GatewayEvent::PortOpened { number, .. } | GatewayEvent::PortClosed { number } => {
                Some(*number)
            }
            GatewayEvent::DataIn { port, .. } | GatewayEvent::DataOut { port, .. } => Some(*port),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_classification() {
        let data = GatewayEvent::DataIn {
            port: 14,
            data: b"FA;".to_vec(),
        };
        assert!(data.is_traffic());
        assert_eq!(data.port(), Some(14));

        let opened = GatewayEvent::PortOpened {
            number: 14,
            kind: PortKind::Master,
        };
        assert!(!opened.is_traffic());
        assert_eq!(opened.port(), Some(14));

        let client = GatewayEvent::ClientConnected {
            peer: "127.0.0.1:5000".into(),
        };
        assert_eq!(client.port(), None);
    }
}
