//! Control frame vocabulary.
//!
//! A control frame actuates one shocker with a [`ControlType`] at an
//! intensity in `0..=MAX_INTENSITY`. Once routed, the frame becomes a
//! [`ShockerCommand`] carrying the hardware address the device needs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::ShockerId;
use crate::shocker::ShockerModel;

/// Highest intensity a control frame may carry.
pub const MAX_INTENSITY: u8 = 100;

/// Kind of actuation requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ControlType {
    /// Stop any running actuation.
    Stop = 0,
    /// Electric stimulus.
    Shock = 1,
    /// Vibration motor.
    Vibrate = 2,
    /// Beeper.
    Sound = 3,
}

impl ControlType {
    /// Wire code of this control type.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Lowercase name, matching the serde representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Shock => "shock",
            Self::Vibrate => "vibrate",
            Self::Sound => "sound",
        }
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A control type code or name that is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ControlTypeError {
    /// Numeric code outside the known range.
    #[error("unknown control type code {0}")]
    UnknownCode(u8),
    /// Name that matches no control type.
    #[error("unknown control type name {0:?}")]
    UnknownName(String),
}

impl TryFrom<u8> for ControlType {
    type Error = ControlTypeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Stop),
            1 => Ok(Self::Shock),
            2 => Ok(Self::Vibrate),
            3 => Ok(Self::Sound),
            other => Err(ControlTypeError::UnknownCode(other)),
        }
    }
}

impl FromStr for ControlType {
    type Err = ControlTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stop" => Ok(Self::Stop),
            "shock" => Ok(Self::Shock),
            "vibrate" => Ok(Self::Vibrate),
            "sound" => Ok(Self::Sound),
            _ => Err(ControlTypeError::UnknownName(s.to_owned())),
        }
    }
}

/// Command handed to a device session for transmission.
///
/// Built by the device lifetime from a validated frame and the shocker's
/// registration, so the session never needs to consult storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShockerCommand {
    /// Target shocker.
    pub shocker: ShockerId,
    /// RF address of the shocker's receiver.
    pub rf_id: u16,
    /// Hardware model, selects the RF protocol variant.
    pub model: ShockerModel,
    /// Requested actuation.
    #[serde(rename = "type")]
    pub control_type: ControlType,
    /// Intensity in `0..=MAX_INTENSITY`.
    pub intensity: u8,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn codes_roundtrip() {
        for ct in [
            ControlType::Stop,
            ControlType::Shock,
            ControlType::Vibrate,
            ControlType::Sound,
        ] {
            assert_eq!(ControlType::try_from(ct.code()), Ok(ct));
        }
    }

    #[test]
    fn unknown_code_rejected() {
        assert_matches!(
            ControlType::try_from(4),
            Err(ControlTypeError::UnknownCode(4))
        );
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!("Vibrate".parse::<ControlType>(), Ok(ControlType::Vibrate));
        assert_eq!("SHOCK".parse::<ControlType>(), Ok(ControlType::Shock));
    }

    #[test]
    fn unknown_name_rejected() {
        assert_matches!(
            "zap".parse::<ControlType>(),
            Err(ControlTypeError::UnknownName(name)) if name == "zap"
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ControlType::Sound).unwrap();
        assert_eq!(json, "\"sound\"");
    }

    #[test]
    fn command_serializes_type_field() {
        let cmd = ShockerCommand {
            shocker: ShockerId::new(),
            rf_id: 1234,
            model: ShockerModel::CaiXianlin,
            control_type: ControlType::Vibrate,
            intensity: 50,
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["type"], "vibrate");
        assert_eq!(value["rfId"], 1234);
        assert_eq!(value["intensity"], 50);
    }
}
