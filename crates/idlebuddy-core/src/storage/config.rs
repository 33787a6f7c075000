//! TOML-based application configuration.
//!
//! Holds the tunables of every subsystem:
//! - Economy production interval and offline earnings cap
//! - Focus session lengths and rewards
//! - Buddy decay rates
//! - Deadline scan interval and urgency thresholds
//! - Battle randomness
//! - Autosave interval
//!
//! Configuration is stored at `~/.config/idlebuddy/config.toml`.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// Economy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyConfig {
    #[serde(default = "default_production_interval_ms")]
    pub production_interval_ms: u64,
    /// Upper bound on production credited for time spent closed.
    #[serde(default = "default_offline_cap_secs")]
    pub offline_cap_secs: u64,
    /// Fixed lottery RNG seed. Random when unset.
    #[serde(default)]
    pub lottery_seed: Option<u64>,
}

/// Focus timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusConfig {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_short_break")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break")]
    pub long_break_minutes: u32,
    #[serde(default = "default_sessions_until_long_break")]
    pub sessions_until_long_break: u32,
    /// Coins for each completed work session.
    #[serde(default = "default_base_reward")]
    pub base_reward: u64,
    /// Extra coins for the session that closes a cycle.
    #[serde(default = "default_cycle_bonus")]
    pub cycle_bonus: u64,
}

/// Buddy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuddyConfig {
    #[serde(default = "default_decay_interval_secs")]
    pub decay_interval_secs: u64,
    #[serde(default = "default_mood_decay")]
    pub mood_decay: f64,
    #[serde(default = "default_energy_decay")]
    pub energy_decay: f64,
    #[serde(default = "default_sleepy_after_minutes")]
    pub sleepy_after_minutes: u64,
    #[serde(default = "default_urgent_hours")]
    pub urgent_hours: f64,
    /// How long the working pose lasts after the last edit.
    #[serde(default = "default_working_linger_secs")]
    pub working_linger_secs: u64,
}

/// Deadline tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineConfig {
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_urgent_hours")]
    pub urgent_hours: f64,
    #[serde(default = "default_approaching_hours")]
    pub approaching_hours: f64,
}

/// Battle configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Damage varies uniformly by `± jitter`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    /// Fixed RNG seed. Random when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_attack_range")]
    pub attack_range: f64,
    #[serde(default = "default_round_interval_ms")]
    pub round_interval_ms: u64,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Seconds between automatic saves in the foreground loop. 0 disables.
    #[serde(default = "default_autosave_secs")]
    pub autosave_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/idlebuddy/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub buddy: BuddyConfig,
    #[serde(default)]
    pub deadlines: DeadlineConfig,
    #[serde(default)]
    pub battle: BattleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// Default functions
fn default_production_interval_ms() -> u64 {
    1000
}
fn default_offline_cap_secs() -> u64 {
    3600
}
fn default_work_minutes() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_sessions_until_long_break() -> u32 {
    4
}
fn default_base_reward() -> u64 {
    50
}
fn default_cycle_bonus() -> u64 {
    100
}
fn default_decay_interval_secs() -> u64 {
    60
}
fn default_mood_decay() -> f64 {
    0.3
}
fn default_energy_decay() -> f64 {
    0.2
}
fn default_sleepy_after_minutes() -> u64 {
    60
}
fn default_urgent_hours() -> f64 {
    2.0
}
fn default_working_linger_secs() -> u64 {
    300
}
fn default_scan_interval_secs() -> u64 {
    30
}
fn default_approaching_hours() -> f64 {
    24.0
}
fn default_jitter() -> f64 {
    0.1
}
fn default_attack_range() -> f64 {
    15.0
}
fn default_round_interval_ms() -> u64 {
    1000
}
fn default_autosave_secs() -> u64 {
    30
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            production_interval_ms: default_production_interval_ms(),
            offline_cap_secs: default_offline_cap_secs(),
            lottery_seed: None,
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break(),
            long_break_minutes: default_long_break(),
            sessions_until_long_break: default_sessions_until_long_break(),
            base_reward: default_base_reward(),
            cycle_bonus: default_cycle_bonus(),
        }
    }
}

impl Default for BuddyConfig {
    fn default() -> Self {
        Self {
            decay_interval_secs: default_decay_interval_secs(),
            mood_decay: default_mood_decay(),
            energy_decay: default_energy_decay(),
            sleepy_after_minutes: default_sleepy_after_minutes(),
            urgent_hours: default_urgent_hours(),
            working_linger_secs: default_working_linger_secs(),
        }
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            urgent_hours: default_urgent_hours(),
            approaching_hours: default_approaching_hours(),
        }
    }
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            jitter: default_jitter(),
            seed: None,
            attack_range: default_attack_range(),
            round_interval_ms: default_round_interval_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            autosave_secs: default_autosave_secs(),
        }
    }
}

/// Longest span a configured interval may describe: 100 years. Larger
/// values are clamped so date arithmetic can never overflow.
const MAX_SPAN_SECS: i64 = 100 * 365 * 24 * 60 * 60;

fn span_secs(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX).min(MAX_SPAN_SECS))
}

fn span_millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX).min(MAX_SPAN_SECS * 1000))
}

impl EconomyConfig {
    /// Never shorter than one millisecond.
    pub fn production_interval(&self) -> Duration {
        span_millis(self.production_interval_ms.max(1))
    }

    pub fn offline_cap(&self) -> Duration {
        span_secs(self.offline_cap_secs)
    }
}

impl BuddyConfig {
    pub fn decay_interval(&self) -> Duration {
        span_secs(self.decay_interval_secs.max(1))
    }

    pub fn sleepy_after(&self) -> Duration {
        span_secs(self.sleepy_after_minutes.saturating_mul(60))
    }

    pub fn working_linger(&self) -> Duration {
        span_secs(self.working_linger_secs)
    }
}

impl DeadlineConfig {
    pub fn scan_interval(&self) -> Duration {
        span_secs(self.scan_interval_secs.max(1))
    }
}

impl BattleConfig {
    pub fn round_interval(&self) -> Duration {
        span_millis(self.round_interval_ms.max(1))
    }
}

impl StorageConfig {
    /// `None` when autosave is disabled.
    pub fn autosave_interval(&self) -> Option<Duration> {
        (self.autosave_secs > 0).then(|| span_secs(self.autosave_secs))
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => parse_number(value)
                        .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?,
                    // Unset optional: numbers stay numbers, "none" clears.
                    serde_json::Value::Null => match value {
                        "" | "none" | "null" => serde_json::Value::Null,
                        _ => parse_number(value)
                            .unwrap_or_else(|| serde_json::Value::String(value.into())),
                    },
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// `<data_dir>/config.toml`
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from disk or return default, writing the default out when the
    /// file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let fail = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| fail(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| fail(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the
    /// field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

fn parse_number(value: &str) -> Option<serde_json::Value> {
    if let Ok(n) = value.parse::<u64>() {
        Some(serde_json::Value::Number(n.into()))
    } else {
        value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let parsed: Config = toml::from_str("[focus]\nwork_minutes = 50\n").unwrap();
        assert_eq!(parsed.focus.work_minutes, 50);
        assert_eq!(parsed.focus.short_break_minutes, 5);
        assert_eq!(parsed.economy.offline_cap_secs, 3600);
        assert_eq!(parsed.deadlines.urgent_hours, 2.0);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("focus.work_minutes").as_deref(), Some("25"));
        assert_eq!(cfg.get("battle.jitter").as_deref(), Some("0.1"));
        assert_eq!(cfg.get("battle.seed").as_deref(), Some("null"));
        assert!(cfg.get("focus.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_numbers() {
        let mut cfg = Config::default();
        cfg.set("deadlines.scan_interval_secs", "10").unwrap();
        cfg.set("buddy.mood_decay", "0.5").unwrap();
        assert_eq!(cfg.deadlines.scan_interval_secs, 10);
        assert_eq!(cfg.buddy.mood_decay, 0.5);
    }

    #[test]
    fn oversized_intervals_are_clamped() {
        let mut cfg = Config::default();
        cfg.set("economy.offline_cap_secs", "100000000000000000").unwrap();
        cfg.set("buddy.sleepy_after_minutes", &u64::MAX.to_string()).unwrap();
        cfg.set("battle.round_interval_ms", &u64::MAX.to_string()).unwrap();
        let century = Duration::days(100 * 365);
        assert_eq!(cfg.economy.offline_cap(), century);
        assert_eq!(cfg.buddy.sleepy_after(), century);
        assert_eq!(cfg.battle.round_interval(), century);

        cfg.set("economy.production_interval_ms", "0").unwrap();
        assert_eq!(cfg.economy.production_interval(), Duration::milliseconds(1));
        cfg.set("storage.autosave_secs", "0").unwrap();
        assert_eq!(cfg.storage.autosave_interval(), None);
    }

    #[test]
    fn set_fills_and_clears_optional_seed() {
        let mut cfg = Config::default();
        cfg.set("battle.seed", "42").unwrap();
        assert_eq!(cfg.battle.seed, Some(42));
        cfg.set("battle.seed", "none").unwrap();
        assert_eq!(cfg.battle.seed, None);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("focus.nonexistent_key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        let result = cfg.set("focus.work_minutes", "lots");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_writes_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("storage.autosave_secs", "0").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().storage.autosave_secs, 0);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "focus = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
