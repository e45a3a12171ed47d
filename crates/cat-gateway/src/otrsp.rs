//! OTRSP interpreter
//!
//! Turns decoded OTRSP commands into canonical property sets. `RX` moves
//! receive focus and routes headphone audio; `TX` moves transmit once the
//! radio's interlock reports ready.

use std::sync::Arc;

use cat_protocol::{OtrspAction, OtrspCommand, RxRouting};
use tracing::{debug, info, warn};

use crate::descriptor::Property;
use crate::error::GatewayError;
use crate::processor::CommandProcessor;

pub struct OtrspInterpreter {
    processor: Arc<CommandProcessor>,
}

impl OtrspInterpreter {
    pub fn new(processor: Arc<CommandProcessor>) -> Self {
        Self { processor }
    }

    /// Parse and apply one command text
    pub async fn execute(&self, text: &str) {
        match OtrspCommand::parse(text) {
            Some(command) => self.apply(&command).await,
            None => warn!("Malformed OTRSP command {:?}", text),
        }
    }

    pub async fn apply(&self, command: &OtrspCommand) {
        match command.action() {
            OtrspAction::Rx(routing) => {
                if let Err(e) = self.route_rx(&routing).await {
                    warn!("OTRSP {} failed: {}", command.to_wire(), e);
                }
            }
            OtrspAction::Tx(slice) => {
                if !self.processor.wait_for_interlock_ready().await {
                    warn!(
                        "Interlock not ready, OTRSP {} skipped",
                        command.to_wire()
                    );
                    return;
                }
                info!("OTRSP transmit on slice {}", slice);
                if let Err(e) = self
                    .processor
                    .set(Property::ActiveTx, &slice.to_string())
                    .await
                {
                    warn!("OTRSP {} failed: {}", command.to_wire(), e);
                }
            }
            OtrspAction::Aux | OtrspAction::Query => {
                debug!("OTRSP {} ignored", command.to_wire());
            }
            OtrspAction::Unknown => warn!("Unknown OTRSP command {}", command.to_wire()),
        }
    }

    async fn route_rx(&self, routing: &RxRouting) -> Result<(), GatewayError> {
        self.processor
            .set(Property::ActiveRx, &routing.active_rx.to_string())
            .await?;
        for (slice, mute) in routing.mute.iter().enumerate() {
            let value = if *mute { "1" } else { "0" };
            self.set_if_present(slice, Property::audio_mute(slice), value)
                .await?;
        }
        for (slice, pan) in routing.pan.iter().enumerate() {
            if let Some(pan) = pan {
                self.set_if_present(slice, Property::audio_pan(slice), &pan.to_string())
                    .await?;
            }
        }
        Ok(())
    }

    /// Audio routing of an absent slice is skipped rather than failed
    async fn set_if_present(
        &self,
        slice: usize,
        property: Property,
        value: &str,
    ) -> Result<(), GatewayError> {
        if !self.processor.state().has_slice(slice) {
            debug!("Slice {} absent, {:?} skipped", slice, property);
            return Ok(());
        }
        self.processor.set(property, value).await
    }
}
