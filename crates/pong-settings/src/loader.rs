//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PongSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{PolicyKind, PongSettings};

/// Resolve the settings file: `$PONG_SETTINGS`, else `~/.pong/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(path) = read_env_string("PONG_SETTINGS") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pong").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PongSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<PongSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<PongSettings> {
    let defaults = serde_json::to_value(PongSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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

/// Reject settings the server or agent cannot run with.
pub fn validate(settings: &PongSettings) -> Result<()> {
    if settings.server.tick_interval_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "server.tickIntervalMs must be positive".into(),
        ));
    }
    if settings.agent.receive_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "agent.receiveTimeoutMs must be positive".into(),
        ));
    }
    if settings.game.winning_score == 0 {
        return Err(SettingsError::InvalidValue(
            "game.winningScore must be positive".into(),
        ));
    }
    Ok(())
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut PongSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are ignored with a warning (fall back to file/default)
pub fn apply_overrides<F>(settings: &mut PongSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("PONG_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("PONG_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.u64("PONG_TICK_INTERVAL_MS", 1, 10_000) {
        settings.server.tick_interval_ms = v;
    }
    if let Some(v) = env.usize("PONG_MAX_CONNECTIONS", 1, 100_000) {
        settings.server.max_connections = v;
    }

    // ── Agent ───────────────────────────────────────────────────────
    if let Some(v) = env.string("GAME_SERVICE_NAME") {
        settings.agent.service_host = v;
    }
    if let Some(v) = env.u16("GAME_SERVICE_PORT", 1, 65535) {
        settings.agent.service_port = v;
    }
    if let Some(v) = env.bool("PONG_AGENT_SECURE") {
        settings.agent.secure = v;
    }
    if let Some(v) = env.u64("PONG_AGENT_TIMEOUT_MS", 10, 600_000) {
        settings.agent.receive_timeout_ms = v;
    }
    if let Some(v) = env.u64("PONG_AGENT_MAX_RETRIES", 0, 100) {
        settings.agent.retry.max_retries = u32::try_from(v).unwrap_or(u32::MAX);
    }

    // ── Game ────────────────────────────────────────────────────────
    if let Some(v) = env.u64("PONG_WINNING_SCORE", 1, 1000) {
        settings.game.winning_score = u32::try_from(v).unwrap_or(u32::MAX);
    }
    if let Some(v) = env.u64("PONG_MAX_STEPS", 1, u64::MAX) {
        settings.game.max_steps = v;
    }
    if let Some(v) = env.policy("PONG_POLICY") {
        settings.game.policy = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("PONG_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("PONG_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Parse a boolean string.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ── Typed readers over a lookup function ────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, kind: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, kind, "invalid env var, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, "bool", parse_bool)
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.parsed(name, "u16", |v| parse_u16_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.parsed(name, "u64", |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.parsed(name, "usize", |v| parse_usize_range(v, min, max))
    }

    fn policy(&self, name: &str) -> Option<PolicyKind> {
        self.parsed(name, "policy", PolicyKind::parse)
    }
}
