//! Per-port command dispatch
//!
//! Reader tasks queue extracted frames as [`PendingCommand`]s; the port's
//! dispatch tick hands each one to [`Dispatcher::dispatch`], which routes
//! it by the port's dialect tag.

use std::str::FromStr;
use std::sync::Arc;

use cat_protocol::frame::split_prefix;
use cat_protocol::so2r;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::otrsp::OtrspInterpreter;
use crate::processor::CommandProcessor;

/// Dialect tag of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// Primary CAT port; receives auto-information
    Master,
    /// Additional CAT port
    Dedicated,
    /// Recorded but opened by another program
    Shared,
    /// Modem lines drive MOX
    Ptt,
    /// CAT port with slice 0/1 prefixes swapped
    So2r,
    Otrsp,
    WinKeyer,
}

impl PortKind {
    pub const ALL: [PortKind; 7] = [
        PortKind::Master,
        PortKind::Dedicated,
        PortKind::Shared,
        PortKind::Ptt,
        PortKind::So2r,
        PortKind::Otrsp,
        PortKind::WinKeyer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PortKind::Master => "master",
            PortKind::Dedicated => "dedicated",
            PortKind::Shared => "shared",
            PortKind::Ptt => "ptt",
            PortKind::So2r => "so2r",
            PortKind::Otrsp => "otrsp",
            PortKind::WinKeyer => "winkeyer",
        }
    }

    /// Ports whose frames go through the command queue
    pub fn is_queued(&self) -> bool {
        matches!(
            self,
            PortKind::Master | PortKind::Dedicated | PortKind::So2r | PortKind::Otrsp
        )
    }
}

impl FromStr for PortKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        PortKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| GatewayError::UnknownPortKind(s.to_string()))
    }
}

/// A frame waiting for the port's dispatch tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub text: String,
    pub port: u32,
    pub kind: PortKind,
}

/// Routes queued commands to the processor or the OTRSP interpreter
pub struct Dispatcher {
    processor: Arc<CommandProcessor>,
    otrsp: OtrspInterpreter,
}

impl Dispatcher {
    pub fn new(processor: Arc<CommandProcessor>) -> Self {
        Self {
            otrsp: OtrspInterpreter::new(processor.clone()),
            processor,
        }
    }

    pub fn processor(&self) -> &Arc<CommandProcessor> {
        &self.processor
    }

    /// Execute one command; returns the reply to write back, if any
    pub async fn dispatch(&self, command: &PendingCommand) -> Option<String> {
        let reply = match command.kind {
            PortKind::Master | PortKind::Dedicated => self.processor.execute(&command.text).await,
            PortKind::So2r => self.dispatch_so2r(&command.text).await,
            PortKind::Otrsp => {
                self.otrsp.execute(&command.text).await;
                return None;
            }
            PortKind::Shared | PortKind::Ptt | PortKind::WinKeyer => {
                warn!(
                    "Dropping {:?} queued on {} port {}",
                    command.text,
                    command.kind.name(),
                    command.port
                );
                return None;
            }
        };

        if reply.is_empty() {
            None
        } else {
            Some(reply)
        }
    }

    async fn dispatch_so2r(&self, text: &str) -> String {
        let text = text.trim().to_ascii_uppercase();
        let (prefix, _) = split_prefix(&text);
        if !so2r::is_paired(prefix) {
            return self.processor.execute(&text).await;
        }

        let remapped = so2r::remap_command(&text, prefix);
        debug!("SO2R {} -> {}", text, remapped);
        let reply = self.processor.execute(&remapped).await;
        so2r::restore_reply(&reply, prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_kind_names() {
        assert_eq!(PortKind::WinKeyer.name(), "winkeyer");
        assert!(PortKind::So2r.is_queued());
        assert!(PortKind::Otrsp.is_queued());
        assert!(!PortKind::Ptt.is_queued());
        assert!(!PortKind::Shared.is_queued());
    }

    #[test]
    fn test_port_kind_from_str() {
        for kind in PortKind::ALL {
            assert_eq!(kind.name().parse::<PortKind>().unwrap(), kind);
        }
        assert_eq!("WinKeyer".parse::<PortKind>().unwrap(), PortKind::WinKeyer);
        assert!(matches!(
            "modem".parse::<PortKind>(),
            Err(GatewayError::UnknownPortKind(_))
        ));
    }

    #[test]
    fn test_port_kind_serde() {
        let kind: PortKind = serde_json::from_str("\"so2r\"").unwrap();
        assert_eq!(kind, PortKind::So2r);
        assert_eq!(
            serde_json::to_string(&PortKind::WinKeyer).unwrap(),
            "\"winkeyer\""
        );
    }
}
