//! Per-connection device lifetime.
//!
//! A [`DeviceLifetime`] owns one [`DeviceSession`] plus the shocker
//! registration snapshot loaded when the device connected. Exactly one
//! lifetime per device is reachable from the registry at a time; older ones
//! are disposed in the background when a device reconnects.
//!
//! State moves strictly forward:
//!
//! ```text
//! Initializing ──▶ Active ──▶ Disposing ──▶ Disposed
//!      │                          ▲
//!      └──────▶ Failed            │
//!      └──────────────────────────┘ (disposed before activation)
//! ```
//!
//! Only `Active` lifetimes accept frames. `receive_frame` holds the snapshot
//! read lock while it checks the state and hands off, and `dispose` takes
//! the write lock before clearing, so teardown waits for in-flight frames
//! and no frame observes a half-cleared snapshot.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use lcg_core::{ControlType, DeviceId, ShockerCommand, ShockerId, ShockerRegistration};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::errors::LifetimeError;
use crate::session::{DeviceSession, Handoff};
use crate::store::DeviceStore;

/// Lifecycle state of a [`DeviceLifetime`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifetimeState {
    /// Loading registration data.
    Initializing = 0,
    /// Routing frames.
    Active = 1,
    /// Teardown in progress.
    Disposing = 2,
    /// Torn down.
    Disposed = 3,
    /// Initialization failed. Never registered.
    Failed = 4,
}

impl LifetimeState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Initializing,
            1 => Self::Active,
            2 => Self::Disposing,
            3 => Self::Disposed,
            _ => Self::Failed,
        }
    }

    /// Lowercase name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Disposing => "disposing",
            Self::Disposed => "disposed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LifetimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of routing a frame into one lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Handed to the session.
    Delivered,
    /// Unknown shocker, or the lifetime is not active.
    EndpointNotFound,
}

/// Binding between one device session and its registration snapshot.
pub struct DeviceLifetime {
    device: DeviceId,
    session: Arc<dyn DeviceSession>,
    state: AtomicU8,
    shockers: RwLock<HashMap<ShockerId, ShockerRegistration>>,
    created_at: DateTime<Utc>,
}

impl DeviceLifetime {
    /// Create a lifetime in `Initializing` for `session`'s device.
    pub fn new(session: Arc<dyn DeviceSession>) -> Self {
        Self {
            device: session.device_id(),
            session,
            state: AtomicU8::new(LifetimeState::Initializing as u8),
            shockers: RwLock::new(HashMap::new()),
            created_at: Utc::now(),
        }
    }

    /// Device this lifetime serves.
    pub fn device_id(&self) -> DeviceId {
        self.device
    }

    /// Current state.
    pub fn state(&self) -> LifetimeState {
        LifetimeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether frames are currently accepted.
    pub fn is_active(&self) -> bool {
        self.state() == LifetimeState::Active
    }

    /// The session this lifetime owns.
    pub fn session(&self) -> &Arc<dyn DeviceSession> {
        &self.session
    }

    /// When the lifetime was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Registration for `shocker`, if it belongs to this device.
    pub fn shocker(&self, shocker: ShockerId) -> Option<ShockerRegistration> {
        self.shockers.read().get(&shocker).cloned()
    }

    /// Copy of every registration in the snapshot.
    pub fn shockers(&self) -> Vec<ShockerRegistration> {
        self.shockers.read().values().cloned().collect()
    }

    /// Number of shockers in the snapshot.
    pub fn shocker_count(&self) -> usize {
        self.shockers.read().len()
    }

    /// Load the registration snapshot and become `Active`.
    ///
    /// No lock is held while the store is queried. On a storage failure the
    /// lifetime moves to `Failed`.
    pub async fn initialize(&self, store: &dyn DeviceStore) -> Result<(), LifetimeError> {
        let state = self.state();
        if state != LifetimeState::Initializing {
            return Err(LifetimeError::NotInitializing {
                device: self.device,
                state,
            });
        }

        let shockers = match store.load_shockers(self.device).await {
            Ok(shockers) => shockers,
            Err(source) => {
                let _ = self.transition(LifetimeState::Initializing, LifetimeState::Failed);
                return Err(LifetimeError::StorageUnavailable {
                    device: self.device,
                    source,
                });
            }
        };

        let mut snapshot = self.shockers.write();
        snapshot.extend(shockers.into_iter().map(|reg| (reg.id, reg)));
        if !self.transition(LifetimeState::Initializing, LifetimeState::Active) {
            // Disposed while loading.
            snapshot.clear();
            return Err(LifetimeError::NotInitializing {
                device: self.device,
                state: self.state(),
            });
        }
        debug!(
            device_id = %self.device,
            shockers = snapshot.len(),
            "device lifetime initialized"
        );
        Ok(())
    }

    /// Route one control action to `shocker` on this device.
    ///
    /// Non-blocking. Returns [`FrameOutcome::EndpointNotFound`] when the
    /// shocker is unknown or the lifetime is not active.
    pub fn receive_frame(
        &self,
        shocker: ShockerId,
        control_type: ControlType,
        intensity: u8,
    ) -> FrameOutcome {
        let snapshot = self.shockers.read();
        if !self.is_active() {
            return FrameOutcome::EndpointNotFound;
        }
        let Some(registration) = snapshot.get(&shocker) else {
            return FrameOutcome::EndpointNotFound;
        };

        let command = ShockerCommand {
            shocker,
            rf_id: registration.rf_id,
            model: registration.model,
            control_type,
            intensity,
        };
        match self.session.deliver(command) {
            Handoff::Accepted => FrameOutcome::Delivered,
            Handoff::Dropped => {
                warn!(
                    device_id = %self.device,
                    shocker_id = %shocker,
                    "session queue full, command dropped"
                );
                FrameOutcome::Delivered
            }
            Handoff::Closed => FrameOutcome::EndpointNotFound,
        }
    }

    /// Tear down: stop accepting frames, close the session, release the
    /// snapshot.
    ///
    /// Idempotent and safe to call concurrently. Returns `true` only for the
    /// call that performed the teardown.
    pub fn dispose(&self) -> bool {
        let began = self.transition(LifetimeState::Active, LifetimeState::Disposing)
            || self.transition(LifetimeState::Initializing, LifetimeState::Disposing);
        if !began {
            return false;
        }

        self.session.close();
        let released = {
            let mut snapshot = self.shockers.write();
            let released = snapshot.len();
            snapshot.clear();
            released
        };
        self.state.store(LifetimeState::Disposed as u8, Ordering::Release);
        debug!(device_id = %self.device, released, "device lifetime disposed");
        true
    }

    /// Close the session of a lifetime that never made it into the registry.
    pub(crate) fn abandon(&self) {
        let _ = self.transition(LifetimeState::Initializing, LifetimeState::Failed);
        self.session.close();
    }

    fn transition(&self, from: LifetimeState, to: LifetimeState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for DeviceLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceLifetime")
            .field("device", &self.device)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
