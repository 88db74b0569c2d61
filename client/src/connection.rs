//! Push channel lifecycle.
//!
//! A background task drives the injected transport through connect, stream
//! consumption, and reconnect with exponential backoff. Raw frames are
//! decoded at this boundary; recognized events flow to the session loop,
//! everything else is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use ripple_engine::{Decoded, NetworkQuality, PushEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::error::{ClientError, Result};
use crate::transport::{EventStream, PushTransport};

/// Lifecycle state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No channel and none wanted
    Disconnected,
    /// Opening the channel or waiting out a backoff delay
    Connecting,
    /// Stream is live
    Connected,
    /// Attempt budget exhausted; a new `connect` starts over
    Error,
}

/// Snapshot of the connection published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Consecutive failures since the last healthy stream
    pub reconnect_attempts: u32,
    pub quality: NetworkQuality,
}

/// Delay before reconnect attempt `attempt` (zero-based): the base delay
/// doubled per failure, saturating at the cap.
pub(crate) fn backoff_delay(base_ms: u64, cap_ms: u64, attempt: u32) -> Duration {
    let doubled = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(doubled.min(cap_ms))
}

enum Command {
    Connect,
    Disconnect,
    Shutdown,
}

/// Handle to the background connection task.
pub struct ConnectionManager {
    command_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Spawn the connection task. The channel stays down until [`connect`]
    /// is called.
    ///
    /// [`connect`]: ConnectionManager::connect
    pub fn spawn(
        config: SessionConfig,
        transport: Arc<dyn PushTransport>,
        event_tx: mpsc::Sender<PushEvent>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        let initial = ConnectionStatus {
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            quality: transport.quality(),
        };
        let (status_tx, status_rx) = watch::channel(initial);
        let task = tokio::spawn(run(config, transport, command_rx, status_tx, event_tx));
        Self {
            command_tx,
            status_rx,
            task,
        }
    }

    /// Bring the channel up, or restart the attempt budget after a terminal
    /// error. No-op while already connected.
    pub async fn connect(&self) -> Result<()> {
        self.command_tx
            .send(Command::Connect)
            .await
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Release the channel and cancel any pending reconnect.
    pub async fn disconnect(&self) -> Result<()> {
        self.command_tx
            .send(Command::Disconnect)
            .await
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Stop the background task.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
    }

    /// Latest published status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch stream of status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let _ = self.command_tx.try_send(Command::Shutdown);
        self.task.abort();
    }
}

async fn run(
    config: SessionConfig,
    transport: Arc<dyn PushTransport>,
    mut command_rx: mpsc::Receiver<Command>,
    status_tx: watch::Sender<ConnectionStatus>,
    event_tx: mpsc::Sender<PushEvent>,
) {
    let mut stream: Option<EventStream> = None;
    let mut wanted = false;
    let mut attempts: u32 = 0;

    loop {
        if let Some(active) = stream.as_mut() {
            tokio::select! {
                biased;
                command = command_rx.recv() => match command {
                    Some(Command::Connect) => {}
                    Some(Command::Disconnect) => {
                        stream = None;
                        wanted = false;
                        attempts = 0;
                        publish(&status_tx, &transport, ConnectionState::Disconnected, 0);
                        tracing::info!("push channel closed");
                    }
                    Some(Command::Shutdown) | None => break,
                },
                frame = active.next() => match frame {
                    Some(Ok(raw)) => {
                        if !forward(&raw, &event_tx).await {
                            // Session loop is gone; nothing left to feed.
                            break;
                        }
                    }
                    Some(Err(error)) => {
                        tracing::warn!(error = %error, "push channel failed");
                        stream = None;
                        attempts = 1;
                        publish(&status_tx, &transport, ConnectionState::Connecting, attempts);
                    }
                    None => {
                        tracing::warn!("push channel ended");
                        stream = None;
                        attempts = 1;
                        publish(&status_tx, &transport, ConnectionState::Connecting, attempts);
                    }
                },
            }
        } else if wanted {
            if attempts >= config.max_reconnect_attempts {
                wanted = false;
                publish(&status_tx, &transport, ConnectionState::Error, attempts);
                tracing::warn!(attempts = attempts, "giving up on reconnect");
                continue;
            }
            if attempts > 0 {
                let delay = backoff_delay(
                    config.reconnect_base_delay_ms,
                    config.reconnect_max_delay_ms,
                    attempts - 1,
                );
                tracing::info!(
                    attempt = attempts + 1,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                let sleep = tokio::time::sleep(delay);
                tokio::pin!(sleep);
                let mut stop = false;
                // The backoff wait stays responsive: a disconnect cancels
                // the retry mid-sleep instead of after it.
                loop {
                    tokio::select! {
                        biased;
                        command = command_rx.recv() => match command {
                            Some(Command::Connect) => {}
                            Some(Command::Disconnect) => {
                                wanted = false;
                                attempts = 0;
                                publish(&status_tx, &transport, ConnectionState::Disconnected, 0);
                                tracing::info!("reconnect cancelled");
                                break;
                            }
                            Some(Command::Shutdown) | None => {
                                stop = true;
                                break;
                            }
                        },
                        _ = &mut sleep => break,
                    }
                }
                if stop {
                    break;
                }
                if !wanted {
                    continue;
                }
            }
            publish(&status_tx, &transport, ConnectionState::Connecting, attempts);
            match transport.open().await {
                Ok(opened) => {
                    stream = Some(opened);
                    attempts = 0;
                    publish(&status_tx, &transport, ConnectionState::Connected, 0);
                    tracing::info!("push channel open");
                }
                Err(error) => {
                    attempts += 1;
                    publish(&status_tx, &transport, ConnectionState::Connecting, attempts);
                    tracing::warn!(attempt = attempts, error = %error, "push channel open failed");
                }
            }
        } else {
            match command_rx.recv().await {
                Some(Command::Connect) => {
                    wanted = true;
                    attempts = 0;
                }
                Some(Command::Disconnect) => {}
                Some(Command::Shutdown) | None => break,
            }
        }
    }

    publish(&status_tx, &transport, ConnectionState::Disconnected, 0);
    tracing::debug!("connection task stopped");
}

/// Decode one raw frame and forward recognized events to the session loop.
/// Returns false when the session side of the queue is gone.
async fn forward(raw: &serde_json::Value, event_tx: &mpsc::Sender<PushEvent>) -> bool {
    match PushEvent::decode(raw) {
        Ok(Decoded::Event(event)) => event_tx.send(event).await.is_ok(),
        Ok(Decoded::Unknown { event_type, entity }) => {
            tracing::debug!(
                event_type = %event_type,
                entity = %entity,
                "skipping unrecognized event"
            );
            true
        }
        Err(error) => {
            tracing::warn!(error = %error, "dropping malformed frame");
            true
        }
    }
}

fn publish(
    status_tx: &watch::Sender<ConnectionStatus>,
    transport: &Arc<dyn PushTransport>,
    state: ConnectionState,
    reconnect_attempts: u32,
) {
    let _ = status_tx.send(ConnectionStatus {
        state,
        reconnect_attempts,
        quality: transport.quality(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        assert_eq!(backoff_delay(1_000, 15_000, 0), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(1_000, 15_000, 1), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(1_000, 15_000, 2), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(1_000, 15_000, 3), Duration::from_millis(8_000));
    }

    #[test]
    fn backoff_saturates_at_cap() {
        assert_eq!(
            backoff_delay(1_000, 15_000, 4),
            Duration::from_millis(15_000)
        );
        assert_eq!(
            backoff_delay(1_000, 15_000, 63),
            Duration::from_millis(15_000)
        );
        // Exponent overflow saturates instead of wrapping.
        assert_eq!(
            backoff_delay(1_000, 15_000, 200),
            Duration::from_millis(15_000)
        );
    }
}
