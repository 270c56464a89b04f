//! Outbound sender: one FIFO worker that retries while the link is down.
use std::time::Duration;

use stream_logging::{stream_debug, stream_info, stream_warn};
use taskstream_core::OutboundCommand;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connection::ConnectionHandle;
use crate::{SendError, SendFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Queue side of the outbound worker.
#[derive(Clone)]
pub struct OutboundSender {
    queue: mpsc::UnboundedSender<OutboundCommand>,
}

impl OutboundSender {
    /// Spawns the worker. Commands that fail for good are reported on
    /// `failures`; cancelled ones are not.
    pub fn spawn(
        connection: ConnectionHandle,
        policy: RetryPolicy,
        failures: mpsc::UnboundedSender<(OutboundCommand, SendFailure)>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (queue, mut commands) = mpsc::unbounded_channel::<OutboundCommand>();
        let task = tokio::spawn(async move {
            loop {
                let command = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    command = commands.recv() => match command {
                        Some(command) => command,
                        None => break,
                    },
                };
                match send_with_retry(&connection, policy, &cancel, &command).await {
                    Ok(()) => stream_debug!("Sent {}", command),
                    Err(SendFailure::Cancelled) => {
                        stream_debug!("Dropped {} on shutdown", command);
                        break;
                    }
                    Err(failure) => {
                        stream_warn!("Giving up on {}: {}", command, failure);
                        let _ = failures.send((command, failure));
                    }
                }
            }
            stream_debug!("Outbound worker stopped");
        });
        (Self { queue }, task)
    }

    /// Queues `command` behind everything already queued.
    pub fn enqueue(&self, command: OutboundCommand) {
        if self.queue.send(command).is_err() {
            stream_warn!("Outbound worker is gone; command dropped");
        }
    }
}

/// Transmits `command`, connecting and retrying per `policy` while not open.
///
/// Stops early once the connection has been disconnected on purpose.
pub async fn send_with_retry(
    connection: &ConnectionHandle,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    command: &OutboundCommand,
) -> Result<(), SendFailure> {
    let frame = command.to_frame()?;
    let attempts = policy.attempts.max(1);
    let mut last = SendError::NotOpen;

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(SendFailure::Cancelled);
        }
        if connection.is_held() {
            return Err(SendFailure::Disconnected);
        }
        if connection.state().is_open() {
            match connection.send(frame.clone()).await {
                Ok(()) => return Ok(()),
                Err(SendError::ActorGone) => return Err(SendFailure::Cancelled),
                Err(err) => last = err,
            }
        } else {
            connection.ensure_connected();
            last = SendError::NotOpen;
        }

        if attempt < attempts {
            stream_info!(
                "{} not sent ({}); attempt {}/{}",
                command,
                last,
                attempt,
                attempts
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(SendFailure::Cancelled),
                _ = tokio::time::sleep(policy.delay) => {}
            }
        }
    }
    Err(SendFailure::Exhausted { attempts, last })
}
