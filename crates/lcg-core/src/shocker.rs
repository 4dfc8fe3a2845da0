//! Shocker registration data loaded from durable storage.

use serde::{Deserialize, Serialize};

use crate::ids::ShockerId;

/// Receiver hardware model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShockerModel {
    /// CaiXianlin-style receiver.
    CaiXianlin,
    /// PetTrainer receiver.
    PetTrainer,
    /// Petrainer 998DR receiver.
    Petrainer998DR,
}

/// Optional per-shocker limits stored alongside the registration.
///
/// Enforcement happens upstream before a frame is constructed; the gateway
/// carries these so consumers can read them from the live snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShockerLimits {
    /// Maximum intensity allowed.
    pub intensity: Option<u8>,
    /// Maximum duration in milliseconds.
    pub duration_ms: Option<u16>,
}

/// One shocker registered to a device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShockerRegistration {
    /// Shocker identity.
    pub id: ShockerId,
    /// RF address of the receiver.
    pub rf_id: u16,
    /// Receiver model.
    pub model: ShockerModel,
    /// Stored limits.
    #[serde(default)]
    pub limits: ShockerLimits,
}

impl ShockerRegistration {
    /// Registration without limits.
    pub fn new(id: ShockerId, rf_id: u16, model: ShockerModel) -> Self {
        Self {
            id,
            rf_id,
            model,
            limits: ShockerLimits::default(),
        }
    }

    /// Attach limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ShockerLimits) -> Self {
        self.limits = limits;
        self
    }
}
