//! Process-wide registry of live device lifetimes.
//!
//! Maps each connected device to its single authoritative
//! [`DeviceLifetime`]. Replacement on reconnect is an atomic swap of the map
//! entry; the displaced lifetime is disposed without holding any map lock.
//! Removal is identity-checked, so a late disconnect from a replaced session
//! can never evict its successor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use lcg_core::{ControlType, DeviceId, ShockerId};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::errors::ConnectError;
use crate::lifetime::{DeviceLifetime, FrameOutcome};
use crate::session::DeviceSession;
use crate::store::DeviceStore;

/// Result of [`LifetimeRegistry::dispatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Handed to the device's session.
    Delivered,
    /// No live lifetime for the device.
    DeviceNotFound,
    /// Device is live but the shocker is unknown or the lifetime is
    /// tearing down.
    EndpointNotFound,
}

impl From<FrameOutcome> for DispatchOutcome {
    fn from(outcome: FrameOutcome) -> Self {
        match outcome {
            FrameOutcome::Delivered => Self::Delivered,
            FrameOutcome::EndpointNotFound => Self::EndpointNotFound,
        }
    }
}

/// Registry of the live lifetime for every connected device.
pub struct LifetimeRegistry {
    lifetimes: DashMap<DeviceId, Arc<DeviceLifetime>>,
    shutting_down: AtomicBool,
}

impl LifetimeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            lifetimes: DashMap::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Register a freshly authenticated session.
    ///
    /// Loads the device's shockers from `store` with no registry lock held,
    /// then installs the new lifetime as the device's entry. A lifetime it
    /// displaces is disposed in the background. On failure the session is
    /// closed and the registry is left untouched.
    #[instrument(skip_all, fields(device_id = %session.device_id()))]
    pub async fn add_connection(
        &self,
        session: Arc<dyn DeviceSession>,
        store: &dyn DeviceStore,
    ) -> Result<Arc<DeviceLifetime>, ConnectError> {
        let device = session.device_id();
        if self.is_shutting_down() {
            session.close();
            return Err(ConnectError::ShuttingDown(device));
        }

        let lifetime = Arc::new(DeviceLifetime::new(session));
        if let Err(err) = lifetime.initialize(store).await {
            lifetime.abandon();
            let err = ConnectError::from(err);
            warn!(
                device_id = %device,
                error = %err,
                category = err.category(),
                "device connection rejected"
            );
            return Err(err);
        }

        match self.lifetimes.insert(device, Arc::clone(&lifetime)) {
            Some(previous) => {
                info!(device_id = %device, "device reconnected, replacing lifetime");
                dispose_detached(previous);
            }
            None => {
                info!(device_id = %device, "device connected");
            }
        }

        // A shutdown that raced the insert may have drained before we landed.
        if self.is_shutting_down() {
            let _ = self.remove_connection(device, &lifetime);
            return Err(ConnectError::ShuttingDown(device));
        }

        Ok(lifetime)
    }

    /// Unregister `lifetime` if it is still the device's current entry.
    ///
    /// Returns `true` when the entry was removed (and the lifetime disposed).
    /// A stale call for an already-replaced lifetime is a no-op.
    pub fn remove_connection(&self, device: DeviceId, lifetime: &Arc<DeviceLifetime>) -> bool {
        let removed = self
            .lifetimes
            .remove_if(&device, |_, current| Arc::ptr_eq(current, lifetime))
            .is_some();

        if removed {
            let _ = lifetime.dispose();
            debug!(device_id = %device, "device lifetime removed");
        } else {
            debug!(device_id = %device, "stale removal ignored, lifetime already replaced");
        }
        removed
    }

    /// Whether `device` currently has a registered lifetime.
    pub fn is_connected(&self, device: DeviceId) -> bool {
        self.lifetimes.contains_key(&device)
    }

    /// Route one control action to a device's current lifetime.
    ///
    /// Never blocks on a lifetime being constructed or torn down.
    pub fn dispatch(
        &self,
        device: DeviceId,
        shocker: ShockerId,
        control_type: ControlType,
        intensity: u8,
    ) -> DispatchOutcome {
        let Some(lifetime) = self.lifetime(device) else {
            return DispatchOutcome::DeviceNotFound;
        };
        lifetime
            .receive_frame(shocker, control_type, intensity)
            .into()
    }

    /// The device's current lifetime, if any.
    pub fn lifetime(&self, device: DeviceId) -> Option<Arc<DeviceLifetime>> {
        self.lifetimes
            .get(&device)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Devices with a registered lifetime.
    pub fn connected_devices(&self) -> Vec<DeviceId> {
        self.lifetimes.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of registered devices.
    pub fn connection_count(&self) -> usize {
        self.lifetimes.len()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Refuse new connections and dispose every registered lifetime.
    ///
    /// Returns the number of lifetimes disposed by this call.
    pub fn shutdown(&self) -> usize {
        self.shutting_down.store(true, Ordering::SeqCst);

        let snapshot: Vec<(DeviceId, Arc<DeviceLifetime>)> = self
            .lifetimes
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let disposed = snapshot
            .iter()
            .filter(|(device, lifetime)| self.remove_connection(*device, lifetime))
            .count();

        info!(disposed, "lifetime registry shut down");
        disposed
    }
}

impl Default for LifetimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispose a displaced lifetime off the caller's path when a runtime is
/// available.
fn dispose_detached(lifetime: Arc<DeviceLifetime>) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        drop(handle.spawn(async move {
            let _ = lifetime.dispose();
        }));
    } else {
        let _ = lifetime.dispose();
    }
}
