//! # lcg-gateway
//!
//! Live control gateway: keeps one authoritative lifetime per connected
//! device and routes control frames into it.
//!
//! - **Sessions**: [`DeviceSession`] seam plus the queue-backed
//!   [`ChannelSession`], its write loop and keepalive monitor
//! - **Lifetimes**: [`DeviceLifetime`] binds a session to the shocker
//!   snapshot loaded from a [`DeviceStore`]
//! - **Registry**: [`LifetimeRegistry`] with atomic replace-on-reconnect and
//!   identity-checked removal
//! - **Routing**: [`FrameRouter`] validates frames and dispatches them
//! - **Connection driver**: [`serve_connection`] ties a transport to the
//!   registry for the length of one connection
//! - **Shutdown**: [`ShutdownCoordinator`] drains the registry and tasks

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod lifetime;
pub mod registry;
pub mod router;
pub mod session;
pub mod shutdown;
pub mod store;

pub use connection::{ConnectionEnd, ConnectionOptions, serve_connection};
pub use errors::{ConnectError, FrameError, LifetimeError, StoreError, TransportError};
pub use lifetime::{DeviceLifetime, FrameOutcome, LifetimeState};
pub use registry::{DispatchOutcome, LifetimeRegistry};
pub use router::{ControlFrame, FrameRouter};
pub use session::{
    ChannelSession, CommandSink, DeviceSession, Handoff, KeepaliveResult, SessionState,
    WriterExit, run_keepalive, run_writer,
};
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use store::{DeviceStore, InMemoryDeviceStore};
