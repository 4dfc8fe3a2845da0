//! Per-connection task: registration, write loop, keepalive, teardown.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, Either};
use lcg_core::ShockerCommand;
use lcg_settings::LiveControlSettings;
use tokio::sync::mpsc;
use tracing::info;

use crate::errors::{ConnectError, TransportError};
use crate::registry::LifetimeRegistry;
use crate::session::{
    ChannelSession, CommandSink, DeviceSession, KeepaliveResult, WriterExit, run_keepalive,
    run_writer,
};
use crate::store::DeviceStore;

/// Timing knobs for a served connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// How often liveness is checked.
    pub keepalive_interval: Duration,
    /// Silence after which the device is dropped.
    pub keepalive_timeout: Duration,
}

impl From<&LiveControlSettings> for ConnectionOptions {
    fn from(settings: &LiveControlSettings) -> Self {
        Self {
            keepalive_interval: settings.keepalive_interval(),
            keepalive_timeout: settings.keepalive_timeout(),
        }
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::from(&LiveControlSettings::default())
    }
}

/// How a served connection ended.
#[derive(Debug)]
pub enum ConnectionEnd {
    /// The registry refused the connection.
    Rejected(ConnectError),
    /// The session was cancelled (replaced, removed, or shut down).
    Cancelled,
    /// The device went silent.
    KeepaliveTimedOut,
    /// The command queue closed.
    QueueClosed,
    /// Writing to the device failed.
    Transport(TransportError),
}

impl ConnectionEnd {
    /// Short reason for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "rejected",
            Self::Cancelled => "cancelled",
            Self::KeepaliveTimedOut => "keepalive_timeout",
            Self::QueueClosed => "queue_closed",
            Self::Transport(_) => "transport_error",
        }
    }
}

impl From<WriterExit> for ConnectionEnd {
    fn from(exit: WriterExit) -> Self {
        match exit {
            WriterExit::Cancelled => Self::Cancelled,
            WriterExit::QueueClosed => Self::QueueClosed,
            WriterExit::Transport(err) => Self::Transport(err),
        }
    }
}

/// Drive one device connection from registration to teardown.
///
/// Registers `session` with the registry, then runs the write loop and the
/// keepalive monitor until either finishes. On the way out the session is
/// closed and exactly this connection's lifetime is removed, so a session
/// that was already replaced leaves its successor alone.
pub async fn serve_connection<S>(
    registry: &LifetimeRegistry,
    store: &dyn DeviceStore,
    session: Arc<ChannelSession>,
    rx: mpsc::Receiver<ShockerCommand>,
    sink: S,
    options: ConnectionOptions,
) -> ConnectionEnd
where
    S: CommandSink,
{
    let device = session.device_id();
    let lifetime = match registry.add_connection(session.clone(), store).await {
        Ok(lifetime) => lifetime,
        Err(err) => {
            session.mark_closed();
            return ConnectionEnd::Rejected(err);
        }
    };

    let writer = pin!(run_writer(Arc::clone(&session), rx, sink));
    let keepalive = pin!(run_keepalive(
        Arc::clone(&session),
        options.keepalive_interval,
        options.keepalive_timeout,
    ));

    let end = match future::select(writer, keepalive).await {
        Either::Left((exit, _)) => ConnectionEnd::from(exit),
        Either::Right((KeepaliveResult::TimedOut, writer)) => {
            session.close();
            let _ = writer.await;
            ConnectionEnd::KeepaliveTimedOut
        }
        Either::Right((KeepaliveResult::Cancelled, writer)) => ConnectionEnd::from(writer.await),
    };

    session.close();
    let _ = registry.remove_connection(device, &lifetime);
    session.mark_closed();
    info!(
        device_id = %device,
        reason = end.reason(),
        accepted = session.accepted_count(),
        dropped = session.drop_count(),
        "device connection ended"
    );
    end
}
