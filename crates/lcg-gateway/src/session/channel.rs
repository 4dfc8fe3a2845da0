//! Queue-backed device session.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lcg_core::{DeviceId, ShockerCommand};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{DeviceSession, Handoff};

/// Transport state of a [`ChannelSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Accepting commands.
    Open = 0,
    /// Close requested; the writer is draining.
    Closing = 1,
    /// Writer finished. Nothing more reaches the device.
    Closed = 2,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Device session that forwards commands into a bounded channel.
pub struct ChannelSession {
    device: DeviceId,
    tx: mpsc::Sender<ShockerCommand>,
    cancel: CancellationToken,
    state: AtomicU8,
    /// Wall-clock time the transport was accepted.
    pub connected_at: DateTime<Utc>,
    started: Instant,
    /// Whether the device showed activity since the last keepalive check.
    pub is_alive: AtomicBool,
    last_seen: Mutex<Instant>,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl ChannelSession {
    /// Wrap an existing sender.
    ///
    /// `cancel` is usually a child of the gateway shutdown token so process
    /// shutdown reaches every session.
    pub fn new(
        device: DeviceId,
        tx: mpsc::Sender<ShockerCommand>,
        cancel: CancellationToken,
    ) -> Self {
        let now = Instant::now();
        Self {
            device,
            tx,
            cancel,
            state: AtomicU8::new(SessionState::Open as u8),
            connected_at: Utc::now(),
            started: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a session together with the receiving half of its queue.
    pub fn channel(
        device: DeviceId,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<ShockerCommand>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(device, tx, cancel), rx)
    }

    /// Current transport state.
    ///
    /// A cancelled token reads as at least `Closing`, whichever path
    /// cancelled it.
    pub fn state(&self) -> SessionState {
        match SessionState::from_u8(self.state.load(Ordering::Acquire)) {
            SessionState::Open if self.cancel.is_cancelled() => SessionState::Closing,
            state => state,
        }
    }

    /// Record that the writer has stopped.
    pub fn mark_closed(&self) {
        self.cancel.cancel();
        self.state.store(SessionState::Closed as u8, Ordering::Release);
    }

    /// Commands accepted into the queue.
    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Commands refused because the queue was full or the session closed.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record inbound activity from the device.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Check and reset the alive flag.
    ///
    /// Returns `true` if the device was active since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last inbound activity (or connect).
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Session age.
    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }

    fn record_drop(&self) {
        let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

impl DeviceSession for ChannelSession {
    fn device_id(&self) -> DeviceId {
        self.device
    }

    fn deliver(&self, command: ShockerCommand) -> Handoff {
        if self.cancel.is_cancelled() {
            self.record_drop();
            return Handoff::Closed;
        }
        match self.tx.try_send(command) {
            Ok(()) => {
                let _ = self.accepted.fetch_add(1, Ordering::Relaxed);
                Handoff::Accepted
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.record_drop();
                Handoff::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.record_drop();
                Handoff::Closed
            }
        }
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn close(&self) {
        let _ = self.state.compare_exchange(
            SessionState::Open as u8,
            SessionState::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.cancel.cancel();
    }
}

impl fmt::Debug for ChannelSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSession")
            .field("device", &self.device)
            .field("state", &self.state())
            .field("accepted", &self.accepted_count())
            .field("dropped", &self.drop_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use lcg_core::{ControlType, ShockerId, ShockerModel};

    use super::*;

    fn command(intensity: u8) -> ShockerCommand {
        ShockerCommand {
            shocker: ShockerId::new(),
            rf_id: 42,
            model: ShockerModel::CaiXianlin,
            control_type: ControlType::Vibrate,
            intensity,
        }
    }

    fn make_session(capacity: usize) -> (ChannelSession, mpsc::Receiver<ShockerCommand>) {
        ChannelSession::channel(DeviceId::new(), capacity, CancellationToken::new())
    }

    #[test]
    fn new_session_is_open_and_alive() {
        let (session, _rx) = make_session(4);
        assert_eq!(session.state(), SessionState::Open);
        assert!(session.is_alive.load(Ordering::Relaxed));
        assert!(!session.is_closed());
    }

    #[tokio::test]
    async fn deliver_queues_command() {
        let (session, mut rx) = make_session(4);
        assert_eq!(session.deliver(command(10)), Handoff::Accepted);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.intensity, 10);
        assert_eq!(session.accepted_count(), 1);
    }

    #[test]
    fn deliver_to_full_queue_is_dropped() {
        let (session, _rx) = make_session(1);
        assert_eq!(session.deliver(command(1)), Handoff::Accepted);
        assert_eq!(session.deliver(command(2)), Handoff::Dropped);
        assert_eq!(session.drop_count(), 1);
    }

    #[test]
    fn deliver_after_receiver_gone_is_closed() {
        let (session, rx) = make_session(4);
        drop(rx);
        assert_eq!(session.deliver(command(1)), Handoff::Closed);
        assert_eq!(session.drop_count(), 1);
    }

    #[test]
    fn close_moves_to_closing_and_refuses_commands() {
        let (session, _rx) = make_session(4);
        session.close();
        assert_eq!(session.state(), SessionState::Closing);
        assert!(session.is_closed());
        assert_eq!(session.deliver(command(1)), Handoff::Closed);
        assert_eq!(session.accepted_count(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let (session, _rx) = make_session(4);
        session.close();
        session.close();
        session.mark_closed();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn parent_cancellation_reaches_session() {
        let parent = CancellationToken::new();
        let (session, _rx) = ChannelSession::channel(DeviceId::new(), 4, parent.child_token());
        assert_eq!(session.state(), SessionState::Open);
        parent.cancel();
        assert!(session.is_closed());
        assert_eq!(session.state(), SessionState::Closing);
        assert_eq!(session.deliver(command(1)), Handoff::Closed);

        session.mark_closed();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn check_alive_resets_flag() {
        let (session, _rx) = make_session(4);
        assert!(session.check_alive());
        assert!(!session.check_alive());
        session.mark_alive();
        assert!(session.check_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn last_seen_tracks_activity() {
        let (session, _rx) = make_session(4);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(session.last_seen_elapsed() >= Duration::from_secs(3));
        session.mark_alive();
        assert!(session.last_seen_elapsed() < Duration::from_secs(1));
        assert!(session.age() >= Duration::from_secs(3));
    }
}
