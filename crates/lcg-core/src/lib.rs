//! # lcg-core
//!
//! Foundation types shared by every live control gateway crate.
//!
//! - **Branded IDs**: [`DeviceId`] and [`ShockerId`] as UUID newtypes so a
//!   shocker ID can never be passed where a device ID is expected
//! - **Control vocabulary**: [`ControlType`], intensity bounds, and the
//!   outbound [`ShockerCommand`]
//! - **Registration data**: [`ShockerRegistration`] with hardware addressing
//!   and optional [`ShockerLimits`]
//! - **Logging**: `tracing` subscriber bootstrap and log capture for tests

#![deny(unsafe_code)]

pub mod control;
pub mod ids;
pub mod logging;
pub mod shocker;

pub use control::{ControlType, ControlTypeError, MAX_INTENSITY, ShockerCommand};
pub use ids::{DeviceId, ShockerId};
pub use shocker::{ShockerLimits, ShockerModel, ShockerRegistration};
