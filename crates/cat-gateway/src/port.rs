//! Port tasks
//!
//! An open port runs as a handful of tasks, each with its own shutdown
//! channel:
//!
//! - **reader**: reads bytes, extracts frames and queues them
//! - **dispatcher**: on every tick drains the queue in FIFO order through
//!   the [`Dispatcher`](crate::dispatcher::Dispatcher); master ports also
//!   forward auto-information frames
//! - **writer**: the only task that writes to the port
//! - **PTT monitor**: polls modem lines instead of reading (PTT ports)
//! - **WinKeyer driver**: replaces reader and dispatcher (WinKeyer ports)
//!
//! Port I/O is generic over [`PortIo`] so tests can use duplex streams.

use std::future::Future;
use std::io::ErrorKind;
use std::sync::Arc;

use cat_detect::{ModemLines, PortIo};
use cat_protocol::{CatCodec, CatFrame, OtrspCodec, ProtocolCodec};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::context::GatewayContext;
use crate::dispatcher::{Dispatcher, PendingCommand, PortKind};
use crate::events::GatewayEvent;
use crate::radio_link::RadioProperty;
use crate::winkeyer::run_winkeyer_port;

/// Commands that can be sent to a port task
#[derive(Debug)]
pub enum PortTaskCommand {
    /// Shutdown the task
    Shutdown,
}

/// Modem lines that key the transmitter on a PTT port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PttPins {
    /// DSR follows the client's DTR
    #[serde(default)]
    pub on_dtr: bool,
    /// CTS follows the client's RTS
    #[serde(default)]
    pub on_rts: bool,
}

impl PttPins {
    /// Transmit level from the line inputs, `None` if no pin is enabled
    fn level(&self, lines: &mut dyn ModemLines) -> Result<Option<bool>, cat_detect::DetectError> {
        if !self.on_dtr && !self.on_rts {
            return Ok(None);
        }
        let dtr = self.on_dtr && lines.data_set_ready()?;
        let rts = self.on_rts && lines.clear_to_send()?;
        Ok(Some(dtr || rts))
    }
}

/// A spawned task and its shutdown channel
struct TaskControl {
    tx: mpsc::Sender<PortTaskCommand>,
    join: JoinHandle<()>,
}

impl TaskControl {
    fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(mpsc::Receiver<PortTaskCommand>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        let join = tokio::spawn(task(rx));
        Self { tx, join }
    }

    async fn stop(self) {
        let _ = self.tx.send(PortTaskCommand::Shutdown).await;
        if let Err(e) = self.join.await {
            warn!("Port task ended abnormally: {}", e);
        }
    }
}

/// Handle to the tasks of one open port
pub struct PortHandle {
    number: u32,
    kind: PortKind,
    events: broadcast::Sender<GatewayEvent>,
    dispatch: Option<TaskControl>,
    io_tasks: Vec<TaskControl>,
}

impl PortHandle {
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// Stop the dispatch tick, then the I/O tasks
    pub async fn close(mut self) {
        if let Some(dispatch) = self.dispatch.take() {
            dispatch.stop().await;
        }
        for task in self.io_tasks.drain(..) {
            task.stop().await;
        }
        info!("Closed {} port {}", self.kind.name(), self.number);
        let _ = self.events.send(GatewayEvent::PortClosed {
            number: self.number,
        });
    }
}

enum FrameCodec {
    Cat(CatCodec),
    Otrsp(OtrspCodec),
}

impl FrameCodec {
    fn for_kind(kind: PortKind) -> Self {
        match kind {
            PortKind::Otrsp => FrameCodec::Otrsp(OtrspCodec::new()),
            _ => FrameCodec::Cat(CatCodec::new()),
        }
    }

    fn push_bytes(&mut self, data: &[u8]) {
        match self {
            FrameCodec::Cat(codec) => codec.push_bytes(data),
            FrameCodec::Otrsp(codec) => codec.push_bytes(data),
        }
    }

    fn next_frame(&mut self) -> Option<String> {
        match self {
            FrameCodec::Cat(codec) => codec.next_command().map(CatFrame::into_string),
            FrameCodec::Otrsp(codec) => codec.next_command().map(|cmd| cmd.to_wire()),
        }
    }
}

fn opened(ctx: &GatewayContext, number: u32, kind: PortKind) {
    info!("Opened {} port {}", kind.name(), number);
    let _ = ctx.events.send(GatewayEvent::PortOpened { number, kind });
}

/// Spawn reader, dispatcher and writer for a queued (CAT or OTRSP) port
pub fn spawn_cat_port<T: PortIo>(
    ctx: &Arc<GatewayContext>,
    number: u32,
    kind: PortKind,
    io: T,
) -> PortHandle {
    let (reader, writer) = tokio::io::split(io);
    let (queue_tx, queue_rx) = mpsc::channel(256);
    let (writer_tx, writer_rx) = mpsc::channel(64);
    let auto_info = (kind == PortKind::Master).then(|| ctx.processor.subscribe_auto_info());

    let events = ctx.events.clone();
    let writer_task =
        TaskControl::spawn(move |rx| run_writer(number, writer, writer_rx, events, rx));

    let events = ctx.events.clone();
    let reader_task =
        TaskControl::spawn(move |rx| run_reader(number, kind, reader, queue_tx, events, rx));

    let dispatcher = ctx.dispatcher.clone();
    let interval = ctx.dispatch_interval;
    let dispatch = TaskControl::spawn(move |rx| async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        run_dispatcher(number, dispatcher, queue_rx, writer_tx, auto_info, tick, rx).await
    });

    opened(ctx, number, kind);
    PortHandle {
        number,
        kind,
        events: ctx.events.clone(),
        dispatch: Some(dispatch),
        io_tasks: vec![reader_task, writer_task],
    }
}

/// Spawn the WinKeyer driver and writer for a WinKeyer port
pub fn spawn_winkeyer_port<T: PortIo>(ctx: &Arc<GatewayContext>, number: u32, io: T) -> PortHandle {
    let (reader, writer) = tokio::io::split(io);
    let (writer_tx, writer_rx) = mpsc::channel(64);

    let events = ctx.events.clone();
    let writer_task =
        TaskControl::spawn(move |rx| run_writer(number, writer, writer_rx, events, rx));

    let processor = ctx.processor.clone();
    let events = ctx.events.clone();
    let keyer_rx = ctx.processor.subscribe_keyer();
    let driver = TaskControl::spawn(move |rx| {
        run_winkeyer_port(number, reader, processor, writer_tx, events, keyer_rx, rx)
    });

    opened(ctx, number, PortKind::WinKeyer);
    PortHandle {
        number,
        kind: PortKind::WinKeyer,
        events: ctx.events.clone(),
        dispatch: None,
        io_tasks: vec![driver, writer_task],
    }
}

/// Spawn the modem-line monitor for a PTT port
pub fn spawn_ptt_port(
    ctx: &Arc<GatewayContext>,
    number: u32,
    lines: Box<dyn ModemLines>,
    pins: PttPins,
) -> PortHandle {
    let ctx_task = ctx.clone();
    let monitor = TaskControl::spawn(move |rx| run_ptt_monitor(number, lines, pins, ctx_task, rx));

    opened(ctx, number, PortKind::Ptt);
    PortHandle {
        number,
        kind: PortKind::Ptt,
        events: ctx.events.clone(),
        dispatch: Some(monitor),
        io_tasks: Vec::new(),
    }
}

async fn run_reader<R>(
    number: u32,
    kind: PortKind,
    mut reader: R,
    queue_tx: mpsc::Sender<PendingCommand>,
    events: broadcast::Sender<GatewayEvent>,
    mut cmd_rx: mpsc::Receiver<PortTaskCommand>,
) where
    R: AsyncRead + Unpin + Send,
{
    debug!("Starting read loop for port {}", number);
    let mut codec = FrameCodec::for_kind(kind);
    let mut buf = vec![0u8; 1024];

    'read: loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PortTaskCommand::Shutdown) | None => break,
                }
            }

            result = reader.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Port {} closed by peer", number);
                        break;
                    }
                    Ok(n) => {
                        let data = &buf[..n];
                        let _ = events.send(GatewayEvent::DataIn { port: number, data: data.to_vec() });
                        codec.push_bytes(data);

                        while let Some(text) = codec.next_frame() {
                            debug!("Port {} <- {}", number, text);
                            let command = PendingCommand { text, port: number, kind };
                            if queue_tx.send(command).await.is_err() {
                                break 'read;
                            }
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
                    Err(e) => {
                        warn!("Read error on port {}: {}", number, e);
                        let _ = events.send(GatewayEvent::Error {
                            source: format!("Port {}", number),
                            message: format!("Read error: {}", e),
                        });
                        break;
                    }
                }
            }
        }
    }

    debug!("Read loop ended for port {}", number);
}

async fn next_auto_info(rx: &mut Option<broadcast::Receiver<String>>) -> Result<String, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_dispatcher(
    number: u32,
    dispatcher: Arc<Dispatcher>,
    mut queue_rx: mpsc::Receiver<PendingCommand>,
    writer_tx: mpsc::Sender<Vec<u8>>,
    mut auto_info: Option<broadcast::Receiver<String>>,
    mut tick: tokio::time::Interval,
    mut cmd_rx: mpsc::Receiver<PortTaskCommand>,
) {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PortTaskCommand::Shutdown) | None => break,
                }
            }

            _ = tick.tick() => {
                while let Ok(command) = queue_rx.try_recv() {
                    if let Some(reply) = dispatcher.dispatch(&command).await {
                        debug!("Port {} -> {}", number, reply);
                        let _ = writer_tx.send(reply.into_bytes()).await;
                    }
                }
            }

            frame = next_auto_info(&mut auto_info) => {
                match frame {
                    Ok(text) => {
                        let _ = writer_tx.send(text.into_bytes()).await;
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Port {} skipped {} auto-information frames", number, n);
                    }
                    Err(RecvError::Closed) => auto_info = None,
                }
            }
        }
    }

    debug!("Dispatcher ended for port {}", number);
}

async fn run_writer<W>(
    number: u32,
    mut writer: W,
    mut data_rx: mpsc::Receiver<Vec<u8>>,
    events: broadcast::Sender<GatewayEvent>,
    mut cmd_rx: mpsc::Receiver<PortTaskCommand>,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PortTaskCommand::Shutdown) | None => break,
                }
            }

            data = data_rx.recv() => {
                let Some(data) = data else { break };
                let result = async {
                    writer.write_all(&data).await?;
                    writer.flush().await
                }
                .await;
                if let Err(e) = result {
                    warn!("Write error on port {}: {}", number, e);
                    let _ = events.send(GatewayEvent::Error {
                        source: format!("Port {}", number),
                        message: format!("Write error: {}", e),
                    });
                    break;
                }
                let _ = events.send(GatewayEvent::DataOut { port: number, data });
            }
        }
    }

    debug!("Writer ended for port {}", number);
}

async fn run_ptt_monitor(
    number: u32,
    mut lines: Box<dyn ModemLines>,
    pins: PttPins,
    ctx: Arc<GatewayContext>,
    mut cmd_rx: mpsc::Receiver<PortTaskCommand>,
) {
    let mut tick = tokio::time::interval(ctx.dispatch_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last: Option<bool> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PortTaskCommand::Shutdown) | None => break,
                }
            }

            _ = tick.tick() => {
                let level = match pins.level(lines.as_mut()) {
                    Ok(Some(level)) => level,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("PTT port {} line read failed: {}", number, e);
                        continue;
                    }
                };
                if last.is_some_and(|previous| previous != level) {
                    info!("PTT port {} {}", number, if level { "keyed" } else { "released" });
                    if let Err(e) = ctx.processor.command_radio(RadioProperty::Mox(level)) {
                        warn!("PTT port {} MOX change failed: {}", number, e);
                    }
                }
                last = Some(level);
            }
        }
    }

    debug!("PTT monitor ended for port {}", number);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLines {
        dsr: bool,
        cts: bool,
    }

    impl ModemLines for FixedLines {
        fn clear_to_send(&mut self) -> Result<bool, cat_detect::DetectError> {
            Ok(self.cts)
        }

        fn data_set_ready(&mut self) -> Result<bool, cat_detect::DetectError> {
            Ok(self.dsr)
        }
    }

    #[test]
    fn test_ptt_level_from_pins() {
        let mut lines = FixedLines {
            dsr: true,
            cts: false,
        };
        let none = PttPins::default();
        assert_eq!(none.level(&mut lines).unwrap(), None);

        let dtr = PttPins {
            on_dtr: true,
            on_rts: false,
        };
        assert_eq!(dtr.level(&mut lines).unwrap(), Some(true));

        let rts = PttPins {
            on_dtr: false,
            on_rts: true,
        };
        assert_eq!(rts.level(&mut lines).unwrap(), Some(false));
    }

    #[test]
    fn test_frame_codec_by_kind() {
        let mut cat = FrameCodec::for_kind(PortKind::Master);
        cat.push_bytes(b"FA;IF;");
        assert_eq!(cat.next_frame().as_deref(), Some("FA;"));
        assert_eq!(cat.next_frame().as_deref(), Some("IF;"));

        let mut otrsp = FrameCodec::for_kind(PortKind::Otrsp);
        otrsp.push_bytes(b"RX1S\r");
        assert_eq!(otrsp.next_frame().as_deref(), Some("RX1S"));
    }
}
