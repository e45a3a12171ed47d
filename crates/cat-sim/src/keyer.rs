//! Simulated CW keyer task
//!
//! Sends queued text one character per tick and reports each finished
//! character as [`RadioNotification::CwCharSent`]. Clearing the buffer
//! reports [`RadioNotification::CwBufferErased`].

use std::collections::VecDeque;
use std::time::Duration;

use cat_gateway::RadioNotification;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// Commands accepted by the keyer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyerCommand {
    /// Append text to the send buffer
    Send(String),
    /// Erase the send buffer
    Clear,
    Shutdown,
}

/// Run the keyer until shutdown or until the radio goes away
pub async fn run_sim_keyer(
    mut cmd_rx: mpsc::UnboundedReceiver<KeyerCommand>,
    notifications: mpsc::UnboundedSender<RadioNotification>,
    char_time: Duration,
) {
    let mut buffer: VecDeque<char> = VecDeque::new();
    let mut tick = tokio::time::interval(char_time.max(Duration::from_millis(1)));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(KeyerCommand::Send(text)) => {
                        debug!("Sim keyer queued {:?}", text);
                        if buffer.is_empty() {
                            tick.reset();
                        }
                        buffer.extend(text.chars());
                    }
                    Some(KeyerCommand::Clear) => {
                        debug!("Sim keyer buffer erased ({} pending)", buffer.len());
                        buffer.clear();
                        let _ = notifications.send(RadioNotification::CwBufferErased);
                    }
                    Some(KeyerCommand::Shutdown) | None => break,
                }
            }

            _ = tick.tick(), if !buffer.is_empty() => {
                if let Some(c) = buffer.pop_front() {
                    trace!("Sim keyer sent {:?}", c);
                    if notifications.send(RadioNotification::CwCharSent).is_err() {
                        break;
                    }
                }
            }
        }
    }

    debug!("Sim keyer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_one_notification_per_char() {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_sim_keyer(cmd_rx, notify_tx, Duration::from_millis(1)));

        cmd_tx.send(KeyerCommand::Send("CQ ".into())).unwrap();
        for _ in 0..3 {
            let n = tokio::time::timeout(Duration::from_secs(1), notify_rx.recv())
                .await
                .unwrap();
            assert_eq!(n, Some(RadioNotification::CwCharSent));
        }

        cmd_tx.send(KeyerCommand::Shutdown).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_reports_erase() {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_sim_keyer(cmd_rx, notify_tx, Duration::from_secs(60)));

        cmd_tx.send(KeyerCommand::Send("TEST".into())).unwrap();
        cmd_tx.send(KeyerCommand::Clear).unwrap();
        let n = tokio::time::timeout(Duration::from_secs(1), notify_rx.recv())
            .await
            .unwrap();
        assert_eq!(n, Some(RadioNotification::CwBufferErased));

        drop(cmd_tx);
        task.await.unwrap();
    }
}
