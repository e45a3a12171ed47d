//! Application context
//!
//! Everything the port tasks share: the processor, the dispatcher built on
//! it, the event channel and the dispatch tick period.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::descriptor::DescriptorTable;
use crate::dispatcher::Dispatcher;
use crate::events::GatewayEvent;
use crate::processor::{run_notification_pump, CommandProcessor, ProcessorConfig};
use crate::radio_link::{RadioLink, RadioNotification};
use crate::state::RadioState;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Period of each port's dispatch tick
    pub dispatch_interval: Duration,
    pub processor: ProcessorConfig,
    /// Initial radio-wide values
    pub radio: RadioState,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            dispatch_interval: Duration::from_millis(10),
            processor: ProcessorConfig::default(),
            radio: RadioState::default(),
        }
    }
}

/// Shared state of a running gateway
pub struct GatewayContext {
    pub processor: Arc<CommandProcessor>,
    pub dispatcher: Arc<Dispatcher>,
    pub events: broadcast::Sender<GatewayEvent>,
    pub dispatch_interval: Duration,
}

impl GatewayContext {
    pub fn new(
        config: GatewayConfig,
        descriptors: DescriptorTable,
        link: Arc<dyn RadioLink>,
    ) -> Arc<Self> {
        let processor = Arc::new(CommandProcessor::new(
            descriptors,
            config.radio,
            link,
            config.processor,
        ));
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            dispatcher: Arc::new(Dispatcher::new(processor.clone())),
            processor,
            events,
            dispatch_interval: config.dispatch_interval,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Feed radio notifications into the processor on a background task
    pub fn spawn_notification_pump(
        &self,
        notifications: mpsc::UnboundedReceiver<RadioNotification>,
    ) -> JoinHandle<()> {
        tokio::spawn(run_notification_pump(self.processor.clone(), notifications))
    }
}
