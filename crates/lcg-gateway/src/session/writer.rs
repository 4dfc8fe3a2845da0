//! Session write loop: drains the command queue into the transport.

use std::sync::Arc;

use async_trait::async_trait;
use lcg_core::ShockerCommand;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::DeviceSession;
use super::channel::ChannelSession;
use crate::errors::TransportError;

/// Outbound half of a device transport.
#[async_trait]
pub trait CommandSink: Send {
    /// Write one command to the device.
    async fn transmit(&mut self, command: ShockerCommand) -> Result<(), TransportError>;
}

/// Why the write loop stopped.
#[derive(Debug)]
pub enum WriterExit {
    /// The session was cancelled.
    Cancelled,
    /// Every sender was dropped.
    QueueClosed,
    /// The transport failed.
    Transport(TransportError),
}

/// Forward queued commands to `sink` until the session is cancelled.
///
/// Cancellation is only observed between commands, so a transmit already in
/// progress is allowed to finish.
pub async fn run_writer<S>(
    session: Arc<ChannelSession>,
    mut rx: mpsc::Receiver<ShockerCommand>,
    mut sink: S,
) -> WriterExit
where
    S: CommandSink,
{
    let device = session.device_id();
    let cancel = session.cancellation().clone();
    let mut sent: u64 = 0;

    let exit = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break WriterExit::Cancelled,
            next = rx.recv() => {
                let Some(command) = next else {
                    break WriterExit::QueueClosed;
                };
                if let Err(err) = sink.transmit(command).await {
                    warn!(device_id = %device, error = %err, "transport write failed");
                    break WriterExit::Transport(err);
                }
                sent += 1;
            }
        }
    };

    debug!(device_id = %device, sent, ?exit, "session writer stopped");
    exit
}
