//! Control frame routing.
//!
//! Upstream control frames carry a raw control-type code and intensity. The
//! router validates the frame shape, then hands it to the registry. It keeps
//! no state of its own.

use std::sync::Arc;

use lcg_core::{ControlType, DeviceId, MAX_INTENSITY, ShockerId};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::errors::FrameError;
use crate::registry::{DispatchOutcome, LifetimeRegistry};

/// Inbound control frame as received from upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlFrame {
    /// Target device.
    pub device: DeviceId,
    /// Target shocker on that device.
    pub shocker: ShockerId,
    /// Raw control type code.
    #[serde(rename = "type")]
    pub control_type: u8,
    /// Requested intensity, 0 to [`MAX_INTENSITY`].
    pub intensity: u16,
}

/// Stateless dispatcher from frames to device lifetimes.
#[derive(Clone)]
pub struct FrameRouter {
    registry: Arc<LifetimeRegistry>,
}

impl FrameRouter {
    /// Route through `registry`.
    pub fn new(registry: Arc<LifetimeRegistry>) -> Self {
        Self { registry }
    }

    /// Validate and dispatch one frame.
    ///
    /// A malformed frame is an error. A well-formed frame for an absent
    /// device or shocker is a normal [`DispatchOutcome`].
    pub fn route(&self, frame: &ControlFrame) -> Result<DispatchOutcome, FrameError> {
        let control_type = ControlType::try_from(frame.control_type)?;
        let intensity = u8::try_from(frame.intensity)
            .ok()
            .filter(|i| *i <= MAX_INTENSITY)
            .ok_or(FrameError::IntensityOutOfRange {
                intensity: frame.intensity,
                max: MAX_INTENSITY,
            })?;

        let outcome = self
            .registry
            .dispatch(frame.device, frame.shocker, control_type, intensity);
        trace!(
            device_id = %frame.device,
            shocker_id = %frame.shocker,
            control_type = %control_type,
            intensity,
            ?outcome,
            "control frame routed"
        );
        Ok(outcome)
    }

    /// Route a batch of frames in order, one result per frame.
    pub fn route_all(&self, frames: &[ControlFrame]) -> Vec<Result<DispatchOutcome, FrameError>> {
        let results: Vec<_> = frames.iter().map(|frame| self.route(frame)).collect();
        let delivered = results
            .iter()
            .filter(|r| matches!(r, Ok(DispatchOutcome::Delivered)))
            .count();
        debug!(frames = frames.len(), delivered, "control batch routed");
        results
    }
}

#[cfg(test)]
mod tests {
    use lcg_core::{ControlTypeError, ShockerModel, ShockerRegistration};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::session::ChannelSession;
    use crate::store::InMemoryDeviceStore;

    fn frame(
        device: DeviceId,
        shocker: ShockerId,
        control_type: u8,
        intensity: u16,
    ) -> ControlFrame {
        ControlFrame {
            device,
            shocker,
            control_type,
            intensity,
        }
    }

    #[test]
    fn unknown_control_type_is_rejected() {
        let router = FrameRouter::new(Arc::new(LifetimeRegistry::new()));
        let err = router
            .route(&frame(DeviceId::new(), ShockerId::new(), 9, 10))
            .unwrap_err();
        assert_eq!(err, FrameError::UnknownControlType(ControlTypeError::UnknownCode(9)));
    }

    #[test]
    fn intensity_above_max_is_rejected() {
        let router = FrameRouter::new(Arc::new(LifetimeRegistry::new()));
        let err = router
            .route(&frame(DeviceId::new(), ShockerId::new(), 1, 101))
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::IntensityOutOfRange {
                intensity: 101,
                max: MAX_INTENSITY
            }
        );

        let err = router
            .route(&frame(DeviceId::new(), ShockerId::new(), 1, 300))
            .unwrap_err();
        assert_eq!(err.category(), "intensity_out_of_range");
    }

    #[test]
    fn valid_frame_for_absent_device_is_device_not_found() {
        let router = FrameRouter::new(Arc::new(LifetimeRegistry::new()));
        let outcome = router
            .route(&frame(DeviceId::new(), ShockerId::new(), 0, 0))
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::DeviceNotFound);
    }

    #[tokio::test]
    async fn routes_to_connected_device() {
        let registry = Arc::new(LifetimeRegistry::new());
        let router = FrameRouter::new(Arc::clone(&registry));
        let store = InMemoryDeviceStore::new();
        let device = DeviceId::new();
        let shocker = ShockerId::new();
        store.insert_device(
            device,
            vec![ShockerRegistration::new(shocker, 9, ShockerModel::PetTrainer)],
        );
        let (session, mut rx) = ChannelSession::channel(device, 8, CancellationToken::new());
        let _ = registry.add_connection(Arc::new(session), &store).await.unwrap();

        let results = router.route_all(&[
            frame(device, shocker, 1, MAX_INTENSITY.into()),
            frame(device, ShockerId::new(), 2, 10),
            frame(device, shocker, 7, 10),
        ]);

        assert_eq!(results[0], Ok(DispatchOutcome::Delivered));
        assert_eq!(results[1], Ok(DispatchOutcome::EndpointNotFound));
        assert!(results[2].is_err());

        let command = rx.recv().await.unwrap();
        assert_eq!(command.control_type, ControlType::Shock);
        assert_eq!(command.intensity, MAX_INTENSITY);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn frame_deserializes_from_wire_json() {
        let device = DeviceId::new();
        let shocker = ShockerId::new();
        let json = format!(
            r#"{{"device":"{device}","shocker":"{shocker}","type":2,"intensity":40}}"#
        );
        let parsed: ControlFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, frame(device, shocker, 2, 40));
    }
}
