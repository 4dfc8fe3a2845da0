//! Layered settings loading.
//!
//! Compiled defaults, then the user's JSON file merged over them key by key,
//! then `LCG_*` environment overrides. The result is validated before it is
//! handed out.

use std::env;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{
    GatewaySettings, KEEPALIVE_INTERVAL_MS_RANGE, KEEPALIVE_TIMEOUT_MS_RANGE, QUEUE_CAPACITY_RANGE,
    SHUTDOWN_TIMEOUT_MS_RANGE,
};

/// `~/.livecontrol/settings.json`, or under `/tmp` when `HOME` is unset.
pub fn settings_path() -> PathBuf {
    env::var_os("HOME")
        .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
        .join(".livecontrol")
        .join("settings.json")
}

/// Load from [`settings_path`] with environment overrides.
pub fn load_settings() -> Result<GatewaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load from `path` with environment overrides.
///
/// A missing file yields defaults. Unreadable files, malformed JSON and
/// settings that fail [`GatewaySettings::validate`] are errors.
pub fn load_settings_from_path(path: &Path) -> Result<GatewaySettings> {
    let parse_failed = |source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let mut document = serde_json::to_value(GatewaySettings::default()).map_err(parse_failed)?;
    match std::fs::read_to_string(path) {
        Ok(text) => {
            debug!(path = %path.display(), "merging settings file");
            let overlay: Value = serde_json::from_str(&text).map_err(parse_failed)?;
            deep_merge(&mut document, overlay);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    let mut settings: GatewaySettings = serde_json::from_value(document).map_err(parse_failed)?;
    apply_env_overrides(&mut settings, |name| env::var(name).ok());
    settings.validate()?;
    Ok(settings)
}

/// Merge `overlay` into `target` in place.
///
/// Objects merge per key, recursively. Anything else in `overlay` replaces
/// the target value. `null` members of an overlay object leave the target
/// untouched.
pub fn deep_merge(target: &mut Value, overlay: Value) {
    match (target, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if value.is_null() {
                    continue;
                }
                match base.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        let _ = base.insert(key, value);
                    }
                }
            }
        }
        (target, overlay) => *target = overlay,
    }
}

/// Apply `LCG_*` overrides read through `lookup`.
///
/// Numeric values outside their allowed range are ignored with a warning.
pub fn apply_env_overrides(
    settings: &mut GatewaySettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let gw = &mut settings.gateway;
    override_in_range(
        &lookup,
        "LCG_COMMAND_QUEUE_CAPACITY",
        QUEUE_CAPACITY_RANGE,
        &mut gw.command_queue_capacity,
    );
    override_in_range(
        &lookup,
        "LCG_KEEPALIVE_INTERVAL_MS",
        KEEPALIVE_INTERVAL_MS_RANGE,
        &mut gw.keepalive_interval_ms,
    );
    override_in_range(
        &lookup,
        "LCG_KEEPALIVE_TIMEOUT_MS",
        KEEPALIVE_TIMEOUT_MS_RANGE,
        &mut gw.keepalive_timeout_ms,
    );
    override_in_range(
        &lookup,
        "LCG_SHUTDOWN_TIMEOUT_MS",
        SHUTDOWN_TIMEOUT_MS_RANGE,
        &mut gw.shutdown_timeout_ms,
    );

    if let Some(level) = lookup("LCG_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
        settings.logging.level = level;
    }
}

/// Parse `raw` and accept it only inside `range`.
pub fn parse_in_range<T>(raw: &str, range: &RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    raw.trim().parse().ok().filter(|value| range.contains(value))
}

fn override_in_range<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    range: RangeInclusive<T>,
    slot: &mut T,
) where
    T: FromStr + PartialOrd,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match parse_in_range(&raw, &range) {
        Some(value) => *slot = value,
        None => warn!(key = name, value = %raw, "ignoring invalid environment override"),
    }
}
