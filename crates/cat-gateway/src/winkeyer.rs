//! WinKeyer port driver
//!
//! One task per WinKeyer port owns the port's decoder. Host bytes are fed
//! to the decoder and its events are carried out on the processor; keyer
//! progress from the radio comes back as echo and status bytes.

use std::io::ErrorKind;
use std::sync::Arc;

use cat_protocol::{WinKeyerDecoder, WinKeyerEvent};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::events::GatewayEvent;
use crate::port::PortTaskCommand;
use crate::processor::CommandProcessor;
use crate::radio_link::{KeyerNotification, RadioProperty};

/// Carry out one decoder event; returns bytes to write back, if any
pub fn apply_keyer_event(processor: &CommandProcessor, event: WinKeyerEvent) -> Option<Vec<u8>> {
    match event {
        WinKeyerEvent::Reply(bytes) => return Some(bytes),
        WinKeyerEvent::HostOpen => info!("WinKeyer host open"),
        WinKeyerEvent::HostClose => info!("WinKeyer host close"),
        WinKeyerEvent::SetSpeed(wpm) => {
            if let Err(e) = processor.command_radio(RadioProperty::CwSpeed(wpm)) {
                warn!("WinKeyer speed {} not applied: {}", wpm, e);
            }
        }
        WinKeyerEvent::SetSidetone(hz) => {
            if let Err(e) = processor.command_radio(RadioProperty::CwPitch(hz)) {
                warn!("WinKeyer sidetone {} not applied: {}", hz, e);
            }
        }
        WinKeyerEvent::Transmit(text) => {
            debug!("WinKeyer send {:?}", text);
            processor.send_cw(&text);
        }
        WinKeyerEvent::ClearBuffer => processor.clear_cw(),
        WinKeyerEvent::Ignored { opcode, params } => {
            debug!("WinKeyer opcode {:02X} {:02X?} ignored", opcode, params);
        }
        WinKeyerEvent::DecodeError(message) => warn!("WinKeyer decode error: {}", message),
    }
    None
}

/// Read loop of a WinKeyer port
pub async fn run_winkeyer_port<R>(
    number: u32,
    mut reader: R,
    processor: Arc<CommandProcessor>,
    writer_tx: mpsc::Sender<Vec<u8>>,
    events: broadcast::Sender<GatewayEvent>,
    mut keyer_rx: broadcast::Receiver<KeyerNotification>,
    mut cmd_rx: mpsc::Receiver<PortTaskCommand>,
) where
    R: AsyncRead + Unpin + Send,
{
    info!("Starting WinKeyer driver on port {}", number);
    let mut decoder = WinKeyerDecoder::new();
    decoder.set_speed(processor.state().radio().cw_speed);
    let mut buf = vec![0u8; 256];

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PortTaskCommand::Shutdown) | None => break,
                }
            }

            result = reader.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("WinKeyer port {} closed by peer", number);
                        break;
                    }
                    Ok(n) => {
                        let data = &buf[..n];
                        debug!("WinKeyer port {} read {:02X?}", number, data);
                        let _ = events.send(GatewayEvent::DataIn { port: number, data: data.to_vec() });

                        for event in decoder.feed(data) {
                            if let Some(reply) = apply_keyer_event(&processor, event) {
                                let _ = writer_tx.send(reply).await;
                            }
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
                    Err(e) => {
                        warn!("Read error on WinKeyer port {}: {}", number, e);
                        let _ = events.send(GatewayEvent::Error {
                            source: format!("Port {}", number),
                            message: format!("Read error: {}", e),
                        });
                        break;
                    }
                }
            }

            notice = keyer_rx.recv() => {
                let bytes = match notice {
                    Ok(KeyerNotification::CharSent) => decoder.char_sent(),
                    Ok(KeyerNotification::BufferErased) => decoder.reset_buffers(),
                    Err(RecvError::Lagged(n)) => {
                        warn!("WinKeyer port {} missed {} keyer notifications", number, n);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if !bytes.is_empty() {
                    let _ = writer_tx.send(bytes).await;
                }
            }
        }
    }

    info!("WinKeyer driver ended on port {}", number);
}
