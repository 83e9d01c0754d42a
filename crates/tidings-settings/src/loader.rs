//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TidingsSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{DuplicateLoginPolicy, TidingsSettings};

/// Resolve the path to the settings file (`~/.tidings/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tidings").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TidingsSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid merged value
/// is an error.
pub fn load_settings_from_path(path: &Path) -> Result<TidingsSettings> {
    load_with_overrides(path, |name| std::env::var(name).ok())
}

/// Load settings from a path, resolving overrides through `lookup`.
pub fn load_with_overrides(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<TidingsSettings> {
    let defaults = serde_json::to_value(TidingsSettings::default()).map_err(SettingsError::Schema)?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TidingsSettings = serde_json::from_value(merged).map_err(SettingsError::Schema)?;
    apply_overrides(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `TIDINGS_*` overrides resolved through `lookup`.
///
/// Integers must parse and fall within range; booleans accept
/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`. Invalid values are
/// ignored with a warning.
pub fn apply_overrides(settings: &mut TidingsSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Gateway ─────────────────────────────────────────────────────
    if let Some(v) = env.string("TIDINGS_WS_HOST") {
        settings.gateway.host = v;
    }
    if let Some(v) = env.u16("TIDINGS_WS_PORT", 1, 65535) {
        settings.gateway.ws_port = v;
    }
    if let Some(v) = env.usize("TIDINGS_MAX_CONN_NUM", 1, 10_000_000) {
        settings.gateway.max_conn_num = v;
    }
    if let Some(v) = env.usize("TIDINGS_MAX_MSG_LEN", 64, 64 * 1024 * 1024) {
        settings.gateway.max_msg_len = v;
    }
    if let Some(v) = env.u64("TIDINGS_WRITE_TIMEOUT_SECS", 1, 3600) {
        settings.gateway.write_timeout_secs = v;
    }
    if let Some(v) = env.u64("TIDINGS_REQUEST_TIMEOUT_SECS", 0, 3600) {
        settings.gateway.request_timeout_secs = v;
    }
    if let Some(v) = env.string("TIDINGS_DELIVERY_URL") {
        settings.gateway.delivery_url = v;
    }
    if let Some(v) = env.string("TIDINGS_DUPLICATE_LOGIN") {
        match serde_json::from_value::<DuplicateLoginPolicy>(Value::String(v.clone())) {
            Ok(policy) => settings.gateway.duplicate_login = policy,
            Err(_) => warn!(key = "TIDINGS_DUPLICATE_LOGIN", value = %v, "invalid policy env var, ignoring"),
        }
    }

    // ── Delivery ────────────────────────────────────────────────────
    if let Some(v) = env.string("TIDINGS_DELIVERY_HOST") {
        settings.delivery.host = v;
    }
    if let Some(v) = env.u16("TIDINGS_DELIVERY_PORT", 1, 65535) {
        settings.delivery.port = v;
    }
    if let Some(v) = env.string("TIDINGS_TOPIC") {
        settings.delivery.topic = v;
    }
    if let Some(v) = env.u32("TIDINGS_PARTITIONS", 1, 1024) {
        settings.delivery.partitions = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("TIDINGS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("TIDINGS_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as an integer within an inclusive range.
pub fn parse_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Override readers ────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn ranged<T>(&self, name: &str, min: T, max: T) -> Option<T>
    where
        T: std::str::FromStr + PartialOrd,
    {
        let val = (self.lookup)(name)?;
        let result = parse_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.ranged(name, min, max)
    }

    fn u32(&self, name: &str, min: u32, max: u32) -> Option<u32> {
        self.ranged(name, min, max)
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.ranged(name, min, max)
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.ranged(name, min, max)
    }
}
