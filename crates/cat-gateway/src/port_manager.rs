//! Port manager
//!
//! Owns the registry of virtual port pairs. Each pair is `N`/`N+10`: client
//! software opens `N`, the gateway opens `N+10`. Pairs are created and
//! removed through a [`PortProvider`]; the gateway end is opened according
//! to the port's dialect tag.

use std::collections::BTreeMap;
use std::sync::Arc;

use cat_detect::PortProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::GatewayContext;
use crate::dispatcher::PortKind;
use crate::error::GatewayError;
use crate::port::{spawn_cat_port, spawn_ptt_port, spawn_winkeyer_port, PortHandle, PttPins};

/// Highest usable port number
pub const MAX_PORT: u32 = 255;

/// Distance between the client and gateway ends of a pair
pub const PAIR_OFFSET: u32 = 10;

/// Lowest client-side number handed out by allocation
pub const FIRST_PAIR: u32 = 4;

/// First free client-side number `N` such that neither `N` nor `N+10` is used
pub fn allocate_pair(used: &[u32]) -> Option<u32> {
    (FIRST_PAIR..=MAX_PORT - PAIR_OFFSET)
        .find(|n| !used.contains(n) && !used.contains(&(n + PAIR_OFFSET)))
}

/// A port pair as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    /// Client-side number `N`
    pub number: u32,
    pub kind: PortKind,
    #[serde(default)]
    pub pins: PttPins,
}

impl PortSpec {
    pub fn new(number: u32, kind: PortKind) -> Self {
        Self {
            number,
            kind,
            pins: PttPins::default(),
        }
    }

    /// Gateway-side number `N+10`
    pub fn gateway_number(&self) -> u32 {
        self.number + PAIR_OFFSET
    }
}

/// Ports persisted for one radio
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioAssignment {
    /// Radio serial number
    pub serial: String,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
}

/// Registry entry as reported to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub spec: PortSpec,
    /// Gateway end is open
    pub open: bool,
}

struct PortRecord {
    spec: PortSpec,
    handle: Option<PortHandle>,
}

pub struct PortManager {
    provider: Arc<dyn PortProvider>,
    ctx: Arc<GatewayContext>,
    ports: BTreeMap<u32, PortRecord>,
}

impl PortManager {
    pub fn new(provider: Arc<dyn PortProvider>, ctx: Arc<GatewayContext>) -> Self {
        Self {
            provider,
            ctx,
            ports: BTreeMap::new(),
        }
    }

    /// Next pair not used on the host or by this manager
    pub fn next_free_pair(&self) -> Option<u32> {
        let mut used = match self.provider.used_numbers() {
            Ok(used) => used,
            Err(e) => {
                warn!("Port enumeration failed: {}", e);
                return None;
            }
        };
        used.extend(self.ports.keys().flat_map(|&n| [n, n + PAIR_OFFSET]));

        let pair = allocate_pair(&used);
        match pair {
            Some(n) => info!("Allocated pair {}/{}", n, n + PAIR_OFFSET),
            None => warn!("No free port pair below {}", MAX_PORT + 1),
        }
        pair
    }

    /// Create a pair and open its gateway end
    ///
    /// A new master port replaces the current one. The registry is only
    /// changed once the pair exists and its gateway end is open; on failure
    /// the previous ports stay as they were. Returns the gateway-side number.
    pub async fn create_port(&mut self, spec: PortSpec) -> Result<u32, GatewayError> {
        if spec.number == 0 || spec.gateway_number() > MAX_PORT {
            return Err(GatewayError::InvalidPort(spec.number));
        }
        let low = spec.number;
        let high = spec.gateway_number();

        self.provider.create_pair(low, high)?;

        // The gateway end of a re-created pair must be released before reopening
        let mut previous = self.ports.remove(&low);
        let was_open = match previous.as_mut().and_then(|r| r.handle.take()) {
            Some(handle) => {
                handle.close().await;
                true
            }
            None => false,
        };

        let handle = match self.open(&spec) {
            Ok(handle) => handle,
            Err(e) => {
                match previous {
                    Some(mut record) => {
                        if was_open {
                            record.handle = self.open(&record.spec).unwrap_or_else(|e| {
                                warn!("Port {} could not be reopened: {}", high, e);
                                None
                            });
                        }
                        self.ports.insert(low, record);
                    }
                    None => {
                        if let Err(e) = self.provider.remove_pair(low, high) {
                            warn!("Pair {}/{} left behind: {}", low, high, e);
                        }
                    }
                }
                self.refresh_so2r();
                return Err(e);
            }
        };

        if spec.kind == PortKind::Master {
            if let Some(old) = self.master() {
                info!("Replacing master port {}", old + PAIR_OFFSET);
                if let Err(e) = self.delete_port(old).await {
                    warn!("Old master port not fully removed: {}", e);
                }
            }
        }

        self.ports.insert(low, PortRecord { spec, handle });
        self.refresh_so2r();
        Ok(high)
    }

    fn open(&self, spec: &PortSpec) -> Result<Option<PortHandle>, GatewayError> {
        let number = spec.gateway_number();
        let handle = match spec.kind {
            PortKind::Shared => {
                info!("Shared port {} recorded, not opened", number);
                return Ok(None);
            }
            PortKind::Ptt => {
                spawn_ptt_port(&self.ctx, number, self.provider.open_lines(number)?, spec.pins)
            }
            PortKind::WinKeyer => spawn_winkeyer_port(&self.ctx, number, self.provider.open(number)?),
            kind => spawn_cat_port(&self.ctx, number, kind, self.provider.open(number)?),
        };
        Ok(Some(handle))
    }

    /// Close the gateway end of a pair, keeping the pair registered
    pub async fn close_port(&mut self, number: u32) -> Result<(), GatewayError> {
        let low = self.resolve(number).ok_or(GatewayError::PortNotFound(number))?;
        if let Some(handle) = self.ports.get_mut(&low).and_then(|r| r.handle.take()) {
            handle.close().await;
        }
        self.refresh_so2r();
        Ok(())
    }

    /// Close a port and remove its pair
    pub async fn delete_port(&mut self, number: u32) -> Result<(), GatewayError> {
        let low = self.resolve(number).ok_or(GatewayError::PortNotFound(number))?;
        if let Some(record) = self.ports.remove(&low) {
            if let Some(handle) = record.handle {
                handle.close().await;
            }
        }
        self.refresh_so2r();
        self.provider.remove_pair(low, low + PAIR_OFFSET)?;
        info!("Removed pair {}/{}", low, low + PAIR_OFFSET);
        Ok(())
    }

    /// Recreate and open every persisted port; returns how many opened
    ///
    /// Failures are logged and skipped.
    pub async fn provision(&mut self, assignments: &[RadioAssignment]) -> usize {
        let mut opened = 0;
        for assignment in assignments {
            info!("Provisioning ports for radio {}", assignment.serial);
            let (masters, others): (Vec<_>, Vec<_>) = assignment
                .ports
                .iter()
                .partition(|spec| spec.kind == PortKind::Master);

            for spec in masters.into_iter().chain(others) {
                match self.create_port(spec.clone()).await {
                    Ok(_) => opened += 1,
                    Err(e) => warn!(
                        "Could not provision {} port {}: {}",
                        spec.kind.name(),
                        spec.number,
                        e
                    ),
                }
            }
        }
        opened
    }

    /// Close every open port; pairs are left in place
    pub async fn shutdown(&mut self) {
        for (_, record) in std::mem::take(&mut self.ports) {
            if let Some(handle) = record.handle {
                handle.close().await;
            }
        }
        self.refresh_so2r();
    }

    pub fn ports(&self) -> Vec<PortInfo> {
        self.ports
            .values()
            .map(|r| PortInfo {
                spec: r.spec.clone(),
                open: r.handle.is_some(),
            })
            .collect()
    }

    /// Client-side number of the master port
    pub fn master(&self) -> Option<u32> {
        self.ports
            .values()
            .find(|r| r.spec.kind == PortKind::Master)
            .map(|r| r.spec.number)
    }

    fn resolve(&self, number: u32) -> Option<u32> {
        if self.ports.contains_key(&number) {
            return Some(number);
        }
        number
            .checked_sub(PAIR_OFFSET)
            .filter(|low| self.ports.contains_key(low))
    }

    fn refresh_so2r(&self) {
        let so2r = self
            .ports
            .values()
            .any(|r| r.spec.kind == PortKind::So2r && r.handle.is_some());
        self.ctx.processor.set_so2r(so2r);
    }
}
