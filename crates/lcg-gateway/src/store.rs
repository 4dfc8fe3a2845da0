//! Durable storage seam.
//!
//! The gateway only needs one query from storage: the shockers registered
//! to a device. [`DeviceStore`] abstracts it so the registry can be driven by
//! a database in production and by [`InMemoryDeviceStore`] in tests and the
//! simulator.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use lcg_core::{DeviceId, ShockerRegistration};

use crate::errors::StoreError;

/// Lookup of a device's registered shockers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Load every shocker registered to `device`.
    async fn load_shockers(&self, device: DeviceId)
    -> Result<Vec<ShockerRegistration>, StoreError>;
}

/// Process-local [`DeviceStore`].
#[derive(Debug)]
pub struct InMemoryDeviceStore {
    devices: DashMap<DeviceId, Vec<ShockerRegistration>>,
    available: AtomicBool,
    latency: Option<Duration>,
    loads: AtomicU64,
}

impl InMemoryDeviceStore {
    /// Empty, available store.
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
            available: AtomicBool::new(true),
            latency: None,
            loads: AtomicU64::new(0),
        }
    }

    /// Delay every load by `latency`, simulating a remote database.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Register (or replace) a device's shockers.
    pub fn insert_device(&self, device: DeviceId, shockers: Vec<ShockerRegistration>) {
        let _ = self.devices.insert(device, shockers);
    }

    /// Forget a device.
    pub fn remove_device(&self, device: DeviceId) {
        let _ = self.devices.remove(&device);
    }

    /// Toggle availability; an unavailable store fails every load.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of loads attempted so far.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryDeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn load_shockers(
        &self,
        device: DeviceId,
    ) -> Result<Vec<ShockerRegistration>, StoreError> {
        let _ = self.loads.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store marked unavailable".into()));
        }
        self.devices
            .get(&device)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound(device))
    }
}
