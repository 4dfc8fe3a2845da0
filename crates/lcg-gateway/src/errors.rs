//! Gateway error types.
//!
//! Routing misses (`DeviceNotFound`, `EndpointNotFound`) are not errors and
//! live in [`crate::registry::DispatchOutcome`]. The types here cover
//! failures that end a connect attempt, reject a malformed frame, or break a
//! transport.

use lcg_core::{ControlTypeError, DeviceId};
use thiserror::Error;

use crate::lifetime::LifetimeState;

/// Failure reported by a [`crate::store::DeviceStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store has no record of the device.
    #[error("device {0} not found in storage")]
    NotFound(DeviceId),
    /// The store could not be reached or queried.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure while initializing a [`crate::lifetime::DeviceLifetime`].
#[derive(Debug, Error)]
pub enum LifetimeError {
    /// The shocker registration could not be loaded.
    #[error("storage unavailable while initializing device {device}: {source}")]
    StorageUnavailable {
        /// Device being initialized.
        device: DeviceId,
        /// Underlying storage failure.
        #[source]
        source: StoreError,
    },
    /// `initialize` was called on a lifetime that already left `Initializing`.
    #[error("lifetime for device {device} is {state}, expected initializing")]
    NotInitializing {
        /// Device of the lifetime.
        device: DeviceId,
        /// State observed.
        state: LifetimeState,
    },
}

/// Failure of [`crate::registry::LifetimeRegistry::add_connection`].
///
/// On any of these the session has been closed and nothing was registered.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Registration data could not be loaded from storage.
    #[error("device {device} rejected, storage unavailable: {source}")]
    StorageUnavailable {
        /// Device that attempted to connect.
        device: DeviceId,
        /// Underlying storage failure.
        #[source]
        source: StoreError,
    },
    /// The registry has been shut down.
    #[error("gateway is shutting down, device {0} rejected")]
    ShuttingDown(DeviceId),
    /// A lifetime invariant was violated during setup.
    #[error("lifetime invariant violated: {0}")]
    Invariant(LifetimeError),
}

impl ConnectError {
    /// Stable category string for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::StorageUnavailable { .. } => "storage_unavailable",
            Self::ShuttingDown(_) => "shutting_down",
            Self::Invariant(_) => "invariant",
        }
    }
}

impl From<LifetimeError> for ConnectError {
    fn from(err: LifetimeError) -> Self {
        match err {
            LifetimeError::StorageUnavailable { device, source } => {
                Self::StorageUnavailable { device, source }
            }
            other @ LifetimeError::NotInitializing { .. } => Self::Invariant(other),
        }
    }
}

/// Structural problem with an incoming control frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The control type code is not recognized.
    #[error(transparent)]
    UnknownControlType(#[from] ControlTypeError),
    /// Intensity exceeds the allowed maximum.
    #[error("intensity {intensity} out of range (max {max})")]
    IntensityOutOfRange {
        /// Intensity received.
        intensity: u16,
        /// Highest allowed intensity.
        max: u8,
    },
}

impl FrameError {
    /// Stable category string for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownControlType(_) => "unknown_control_type",
            Self::IntensityOutOfRange { .. } => "intensity_out_of_range",
        }
    }
}

/// Failure writing to the device transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the transport.
    #[error("transport closed by peer")]
    Closed,
    /// I/O failure on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Command could not be encoded for the wire.
    #[error("failed to encode command: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn storage_failure_maps_to_connect_storage_unavailable() {
        let device = DeviceId::new();
        let err: ConnectError = LifetimeError::StorageUnavailable {
            device,
            source: StoreError::Unavailable("db down".into()),
        }
        .into();
        assert_matches!(err, ConnectError::StorageUnavailable { device: d, .. } if d == device);
        assert_eq!(err.category(), "storage_unavailable");
        assert!(err.to_string().contains("db down"));
    }

    #[test]
    fn not_initializing_maps_to_invariant() {
        let err: ConnectError = LifetimeError::NotInitializing {
            device: DeviceId::new(),
            state: LifetimeState::Disposed,
        }
        .into();
        assert_matches!(err, ConnectError::Invariant(_));
        assert!(err.to_string().contains("disposed"));
    }

    #[test]
    fn frame_error_display() {
        let err = FrameError::IntensityOutOfRange {
            intensity: 150,
            max: 100,
        };
        assert_eq!(err.to_string(), "intensity 150 out of range (max 100)");
        assert_eq!(err.category(), "intensity_out_of_range");
    }

    #[test]
    fn unknown_control_type_is_transparent() {
        let err: FrameError = ControlTypeError::UnknownCode(9).into();
        assert_eq!(err.to_string(), "unknown control type code 9");
    }
}
