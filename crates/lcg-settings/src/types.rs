//! Settings type definitions.
//!
//! Field names are camelCase on the wire. Every struct is `#[serde(default)]`
//! so a partial JSON file only overrides what it mentions.

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Device connection and dispatch settings.
    pub gateway: LiveControlSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Accepted range of `gateway.commandQueueCapacity`.
pub const QUEUE_CAPACITY_RANGE: RangeInclusive<usize> = 1..=65_536;
/// Accepted range of `gateway.keepaliveIntervalMs`.
pub const KEEPALIVE_INTERVAL_MS_RANGE: RangeInclusive<u64> = 100..=600_000;
/// Accepted range of `gateway.keepaliveTimeoutMs`.
pub const KEEPALIVE_TIMEOUT_MS_RANGE: RangeInclusive<u64> = 100..=3_600_000;
/// Accepted range of `gateway.shutdownTimeoutMs`.
pub const SHUTDOWN_TIMEOUT_MS_RANGE: RangeInclusive<u64> = 0..=600_000;

impl GatewaySettings {
    /// Reject values and combinations the gateway cannot run with.
    ///
    /// Applies the same ranges the `LCG_*` overrides are checked against.
    pub fn validate(&self) -> Result<()> {
        let gw = &self.gateway;
        check_range(
            "gateway.commandQueueCapacity",
            gw.command_queue_capacity,
            &QUEUE_CAPACITY_RANGE,
        )?;
        check_range(
            "gateway.keepaliveIntervalMs",
            gw.keepalive_interval_ms,
            &KEEPALIVE_INTERVAL_MS_RANGE,
        )?;
        check_range(
            "gateway.keepaliveTimeoutMs",
            gw.keepalive_timeout_ms,
            &KEEPALIVE_TIMEOUT_MS_RANGE,
        )?;
        check_range(
            "gateway.shutdownTimeoutMs",
            gw.shutdown_timeout_ms,
            &SHUTDOWN_TIMEOUT_MS_RANGE,
        )?;
        if gw.keepalive_timeout_ms < gw.keepalive_interval_ms {
            return Err(SettingsError::Invalid(format!(
                "gateway.keepaliveTimeoutMs ({}) is shorter than keepaliveIntervalMs ({})",
                gw.keepalive_timeout_ms, gw.keepalive_interval_ms
            )));
        }
        Ok(())
    }
}

fn check_range<T>(key: &str, value: T, range: &RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::Invalid(format!(
            "{key} ({value}) must be within {}..={}",
            range.start(),
            range.end()
        )))
    }
}

/// Device connection and dispatch settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveControlSettings {
    /// Bound of each session's outbound command queue.
    pub command_queue_capacity: usize,
    /// How often a session's liveness is checked.
    pub keepalive_interval_ms: u64,
    /// Silence after which a session is considered dead.
    pub keepalive_timeout_ms: u64,
    /// Upper bound on waiting for connection tasks during shutdown.
    pub shutdown_timeout_ms: u64,
}

impl Default for LiveControlSettings {
    fn default() -> Self {
        Self {
            command_queue_capacity: 32,
            keepalive_interval_ms: 5_000,
            keepalive_timeout_ms: 15_000,
            shutdown_timeout_ms: 10_000,
        }
    }
}

impl LiveControlSettings {
    /// Keepalive check interval.
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    /// Keepalive timeout.
    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_millis(self.keepalive_timeout_ms)
    }

    /// Shutdown drain timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"gateway": {"commandQueueCapacity": 8}}"#;
        let settings: GatewaySettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.gateway.command_queue_capacity, 8);
        assert_eq!(settings.gateway.keepalive_interval_ms, 5_000);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(GatewaySettings::default()).unwrap();
        assert_eq!(value["gateway"]["keepaliveTimeoutMs"], 15_000);
        assert_eq!(value["gateway"]["shutdownTimeoutMs"], 10_000);
    }

    #[test]
    fn durations_follow_millis() {
        let gw = LiveControlSettings::default();
        assert_eq!(gw.keepalive_interval(), Duration::from_secs(5));
        assert_eq!(gw.keepalive_timeout(), Duration::from_secs(15));
        assert_eq!(gw.shutdown_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut settings = GatewaySettings::default();
        settings.gateway.command_queue_capacity = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn validate_enforces_upper_bounds() {
        let mut settings = GatewaySettings::default();
        settings.gateway.command_queue_capacity = 65_537;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("commandQueueCapacity"));

        let mut settings = GatewaySettings::default();
        settings.gateway.keepalive_interval_ms = 600_001;
        settings.gateway.keepalive_timeout_ms = 3_600_000;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("keepaliveIntervalMs"));

        let mut settings = GatewaySettings::default();
        settings.gateway.shutdown_timeout_ms = 600_001;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_accepts_range_edges() {
        let mut settings = GatewaySettings::default();
        settings.gateway.command_queue_capacity = 65_536;
        settings.gateway.keepalive_interval_ms = 100;
        settings.gateway.keepalive_timeout_ms = 3_600_000;
        settings.gateway.shutdown_timeout_ms = 0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validate_rejects_timeout_below_interval() {
        let mut settings = GatewaySettings::default();
        settings.gateway.keepalive_interval_ms = 10_000;
        settings.gateway.keepalive_timeout_ms = 5_000;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("keepaliveTimeoutMs"));
    }
}
