//! Keepalive liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::warn;

use super::DeviceSession;
use super::channel::ChannelSession;

/// Outcome of the keepalive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepaliveResult {
    /// The device stopped showing activity within the timeout window.
    TimedOut,
    /// The session was cancelled.
    Cancelled,
}

/// Watch a session's liveness until it times out or is cancelled.
///
/// At each `interval` tick the alive flag is checked and reset. Once
/// `timeout / interval` consecutive ticks (at least one) pass without
/// activity the device is considered dead. A zero `interval` is treated as
/// one millisecond.
pub async fn run_keepalive(
    session: Arc<ChannelSession>,
    interval: Duration,
    timeout: Duration,
) -> KeepaliveResult {
    let interval = interval.max(Duration::from_millis(1));
    let mut check_interval = time::interval(interval);
    let mut missed: u32 = 0;
    let interval_ms = interval.as_millis();
    let max_missed = u32::try_from(timeout.as_millis() / interval_ms)
        .unwrap_or(u32::MAX)
        .max(1);
    let cancel = session.cancellation().clone();

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                if session.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        let silent_ms = u64::try_from(session.last_seen_elapsed().as_millis())
                            .unwrap_or(u64::MAX);
                        warn!(
                            device_id = %session.device_id(),
                            missed,
                            silent_ms,
                            "device keepalive timed out"
                        );
                        return KeepaliveResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return KeepaliveResult::Cancelled;
            }
        }
    }
}
