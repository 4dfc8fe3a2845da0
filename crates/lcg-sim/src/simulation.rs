//! In-process devices driven through the real registry and router.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lcg_core::{DeviceId, ShockerCommand, ShockerId, ShockerModel, ShockerRegistration};
use lcg_gateway::{
    ChannelSession, CommandSink, ConnectionEnd, ConnectionOptions, ControlFrame, DeviceSession,
    DispatchOutcome, FrameError, FrameRouter, InMemoryDeviceStore, LifetimeRegistry,
    ShutdownCoordinator, TransportError, serve_connection,
};
use lcg_settings::GatewaySettings;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const MODELS: [ShockerModel; 3] = [
    ShockerModel::CaiXianlin,
    ShockerModel::PetTrainer,
    ShockerModel::Petrainer998DR,
];

/// Transport stand-in that counts what reaches the "hardware".
struct SimulatedSink {
    device: DeviceId,
    transmitted: Arc<AtomicU64>,
}

#[async_trait]
impl CommandSink for SimulatedSink {
    async fn transmit(&mut self, command: ShockerCommand) -> Result<(), TransportError> {
        let _ = self.transmitted.fetch_add(1, Ordering::Relaxed);
        debug!(
            device_id = %self.device,
            shocker_id = %command.shocker,
            rf_id = command.rf_id,
            control_type = %command.control_type,
            intensity = command.intensity,
            "device received command"
        );
        Ok(())
    }
}

/// A provisioned fake device.
#[derive(Debug)]
pub struct SimulatedDevice {
    /// Device identity.
    pub id: DeviceId,
    /// Shockers registered to it.
    pub shockers: Vec<ShockerId>,
    transmitted: Arc<AtomicU64>,
}

impl SimulatedDevice {
    /// Commands written to this device's transports so far.
    pub fn transmitted(&self) -> u64 {
        self.transmitted.load(Ordering::Relaxed)
    }
}

/// Counts of routing results for a burst of frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BurstTally {
    /// Frames handed to a session.
    pub delivered: usize,
    /// Frames for devices with no lifetime.
    pub device_not_found: usize,
    /// Frames for unknown shockers.
    pub endpoint_not_found: usize,
    /// Frames rejected as malformed.
    pub rejected: usize,
}

impl BurstTally {
    /// Count one routing result.
    pub fn record(&mut self, result: &Result<DispatchOutcome, FrameError>) {
        match result {
            Ok(DispatchOutcome::Delivered) => self.delivered += 1,
            Ok(DispatchOutcome::DeviceNotFound) => self.device_not_found += 1,
            Ok(DispatchOutcome::EndpointNotFound) => self.endpoint_not_found += 1,
            Err(_) => self.rejected += 1,
        }
    }
}

/// Gateway components wired the way a server would wire them.
pub struct Simulation {
    /// Live lifetimes.
    pub registry: Arc<LifetimeRegistry>,
    /// Registration data.
    pub store: Arc<InMemoryDeviceStore>,
    /// Root shutdown signal.
    pub shutdown: ShutdownCoordinator,
    router: FrameRouter,
    options: ConnectionOptions,
    capacity: usize,
    next_rf_id: AtomicU16,
}

impl Simulation {
    /// Build from loaded settings.
    pub fn new(settings: &GatewaySettings) -> Self {
        let registry = Arc::new(LifetimeRegistry::new());
        Self {
            router: FrameRouter::new(Arc::clone(&registry)),
            registry,
            store: Arc::new(InMemoryDeviceStore::new()),
            shutdown: ShutdownCoordinator::new(),
            options: ConnectionOptions::from(&settings.gateway),
            capacity: settings.gateway.command_queue_capacity,
            next_rf_id: AtomicU16::new(1),
        }
    }

    /// Register `count` devices with `shockers` shockers each in the store.
    pub fn provision(&self, count: usize, shockers: usize) -> Vec<SimulatedDevice> {
        (0..count)
            .map(|_| {
                let id = DeviceId::new();
                let registrations: Vec<_> = (0..shockers)
                    .map(|i| {
                        let rf_id = self.next_rf_id.fetch_add(1, Ordering::Relaxed);
                        ShockerRegistration::new(ShockerId::new(), rf_id, MODELS[i % MODELS.len()])
                    })
                    .collect();
                let shocker_ids = registrations.iter().map(|r| r.id).collect();
                self.store.insert_device(id, registrations);
                SimulatedDevice {
                    id,
                    shockers: shocker_ids,
                    transmitted: Arc::new(AtomicU64::new(0)),
                }
            })
            .collect()
    }

    /// Open a transport for `device` and serve it until it closes.
    ///
    /// The device reports activity at half the keepalive interval so it is
    /// never timed out while the simulation runs.
    pub fn connect(&self, device: &SimulatedDevice) -> JoinHandle<ConnectionEnd> {
        let (session, rx) =
            ChannelSession::channel(device.id, self.capacity, self.shutdown.session_token());
        let session = Arc::new(session);
        let sink = SimulatedSink {
            device: device.id,
            transmitted: Arc::clone(&device.transmitted),
        };

        let registry = Arc::clone(&self.registry);
        let store = Arc::clone(&self.store);
        let options = self.options;
        tokio::spawn(async move {
            let heartbeat = report_activity(Arc::clone(&session), options.keepalive_interval / 2);
            let served =
                serve_connection(&registry, store.as_ref(), session, rx, sink, options);
            let (end, ()) = tokio::join!(served, heartbeat);
            end
        })
    }

    /// Wait until every device has a live lifetime.
    pub async fn wait_connected(&self, devices: &[SimulatedDevice], timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while !devices.iter().all(|d| {
                self.registry
                    .lifetime(d.id)
                    .is_some_and(|lifetime| lifetime.is_active())
            }) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Route `frames` frames round-robin across devices and shockers, plus
    /// one probe each for an unknown device, an unknown shocker, and a
    /// malformed control type.
    pub fn run_burst(&self, devices: &[SimulatedDevice], frames: usize) -> BurstTally {
        let mut batch: Vec<ControlFrame> = Vec::with_capacity(frames + 3);
        for (i, device) in devices.iter().cycle().take(frames).enumerate() {
            if device.shockers.is_empty() {
                continue;
            }
            let shocker = device.shockers[(i / devices.len()) % device.shockers.len()];
            batch.push(ControlFrame {
                device: device.id,
                shocker,
                control_type: u8::try_from(i % 4).unwrap_or_default(),
                intensity: u16::try_from(i * 7 % 101).unwrap_or_default(),
            });
        }

        if let Some(first) = devices.first() {
            batch.push(ControlFrame {
                device: DeviceId::new(),
                shocker: ShockerId::new(),
                control_type: 2,
                intensity: 10,
            });
            batch.push(ControlFrame {
                device: first.id,
                shocker: ShockerId::new(),
                control_type: 2,
                intensity: 10,
            });
            batch.push(ControlFrame {
                device: first.id,
                shocker: first.shockers.first().copied().unwrap_or_default(),
                control_type: 9,
                intensity: 10,
            });
        }

        let mut tally = BurstTally::default();
        for result in self.router.route_all(&batch) {
            tally.record(&result);
        }
        tally
    }

    /// Connect `device` again and wait for the new lifetime to take over.
    pub async fn reconnect(
        &self,
        device: &SimulatedDevice,
        timeout: Duration,
    ) -> Option<JoinHandle<ConnectionEnd>> {
        let previous = self.registry.lifetime(device.id);
        let handle = self.connect(device);
        let replaced = tokio::time::timeout(timeout, async {
            loop {
                let current = self.registry.lifetime(device.id);
                let swapped = match (&previous, &current) {
                    (Some(old), Some(new)) => !Arc::ptr_eq(old, new) && new.is_active(),
                    (None, Some(new)) => new.is_active(),
                    _ => false,
                };
                if swapped {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok();

        if replaced {
            info!(device_id = %device.id, "device reconnected");
            Some(handle)
        } else {
            handle.abort();
            None
        }
    }
}

/// Mark the session alive every `every` until it is cancelled.
async fn report_activity(session: Arc<ChannelSession>, every: Duration) {
    let cancel = session.cancellation().clone();
    let every = every.max(Duration::from_millis(1));
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(every) => session.mark_alive(),
        }
    }
}
