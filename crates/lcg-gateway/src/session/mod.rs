//! Device sessions: the live transport link to one connected device.
//!
//! The registry and lifetimes only see the [`DeviceSession`] trait. The
//! bundled implementation, [`ChannelSession`], hands commands to a bounded
//! queue drained by [`run_writer`], and is kept honest by [`run_keepalive`].

pub mod channel;
pub mod keepalive;
pub mod writer;

use lcg_core::{DeviceId, ShockerCommand};
use tokio_util::sync::CancellationToken;

pub use channel::{ChannelSession, SessionState};
pub use keepalive::{KeepaliveResult, run_keepalive};
pub use writer::{CommandSink, WriterExit, run_writer};

/// Result of handing a command to a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handoff {
    /// The command was queued for the device.
    Accepted,
    /// The session is open but could not take the command (queue full).
    Dropped,
    /// The session is closing or closed.
    Closed,
}

/// A live, authenticated link to one device.
///
/// `deliver` must not block: it is called while a lifetime holds its
/// registration snapshot for reading.
pub trait DeviceSession: Send + Sync + 'static {
    /// Identity of the device on the other end.
    fn device_id(&self) -> DeviceId;

    /// Hand a command to the transport. Fire-and-forget.
    fn deliver(&self, command: ShockerCommand) -> Handoff;

    /// Token whose cancellation tears the session down.
    fn cancellation(&self) -> &CancellationToken;

    /// Request the session to close. Idempotent.
    fn close(&self) {
        self.cancellation().cancel();
    }

    /// Whether closure has been requested.
    fn is_closed(&self) -> bool {
        self.cancellation().is_cancelled()
    }
}
