//! Key-value persistence of saved state.
//!
//! Every stored value is wrapped in a [`SaveEnvelope`] carrying the format
//! version and the time of the save. The in-memory state stays authoritative:
//! a failed save is reported to the caller but never rolls anything back.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::economy::EconomyState;
use crate::error::PersistenceError;

/// Current save format version.
pub const SAVE_VERSION: u32 = 1;

/// Keys under which each subsystem is saved.
pub mod keys {
    pub const ECONOMY: &str = "economy";
    pub const FOCUS: &str = "focus";
    pub const BUDDY: &str = "buddy";
    pub const DEADLINES: &str = "deadlines";
    pub const BATTLE: &str = "battle";
    /// Flat economy layout written by older releases.
    pub const LEGACY_GAME_STATE: &str = "gameState";
}

/// Durable key-value store.
pub trait Persistence {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError>;
    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError>;
    /// Returns whether the key existed.
    fn remove(&mut self, key: &str) -> Result<bool, PersistenceError>;
    /// Make every previous save durable.
    fn flush(&mut self) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveEnvelope<T> {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub data: T,
}

/// Store `data` under `key`, stamped with `now`.
pub fn write<T: Serialize + ?Sized>(
    store: &mut dyn Persistence,
    key: &str,
    data: &T,
    now: DateTime<Utc>,
) -> Result<(), PersistenceError> {
    let envelope = SaveEnvelope {
        version: SAVE_VERSION,
        saved_at: now,
        data,
    };
    let value = serde_json::to_value(&envelope)?;
    store.save(key, &value)
}

/// Load the envelope stored under `key`, if any.
pub fn read<T: DeserializeOwned>(
    store: &dyn Persistence,
    key: &str,
) -> Result<Option<SaveEnvelope<T>>, PersistenceError> {
    let Some(value) = store.load(key)? else {
        return Ok(None);
    };
    let envelope: SaveEnvelope<T> =
        serde_json::from_value(value).map_err(|e| PersistenceError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
    if envelope.version > SAVE_VERSION {
        warn!(
            key,
            version = envelope.version,
            "save was written by a newer version"
        );
    }
    Ok(Some(envelope))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyGameState {
    #[serde(default)]
    coins: f64,
    #[serde(default)]
    total_coins_earned: f64,
    #[serde(default)]
    total_clicks: u64,
    /// `{ id: { count, .. } }` or `{ id: count }`
    #[serde(default)]
    upgrades: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    achievements: Vec<String>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    last_saved: Option<i64>,
}

impl LegacyGameState {
    fn into_economy(self) -> EconomyState {
        let mut state = EconomyState::default();
        state.coins = self.coins.max(0.0);
        state.total_coins_earned = self.total_coins_earned.max(state.coins);
        state.total_clicks = self.total_clicks;
        for (id, value) in self.upgrades {
            let count = value
                .get("count")
                .and_then(serde_json::Value::as_u64)
                .or_else(|| value.as_u64())
                .unwrap_or(0);
            match state.upgrades.get_mut(&id) {
                Some(upgrade) => upgrade.count = u32::try_from(count).unwrap_or(u32::MAX),
                None => warn!(upgrade_id = %id, "dropping unknown legacy upgrade"),
            }
        }
        state.achievements_unlocked.extend(self.achievements);
        state.recompute_production();
        state
    }
}

/// Adopt a legacy `gameState` save when no current economy save exists.
/// The converted state is written under [`keys::ECONOMY`] and the legacy key
/// is removed. Returns whether a migration happened.
pub fn migrate_legacy(
    store: &mut dyn Persistence,
    now: DateTime<Utc>,
) -> Result<bool, PersistenceError> {
    if store.load(keys::ECONOMY)?.is_some() {
        return Ok(false);
    }
    let Some(raw) = store.load(keys::LEGACY_GAME_STATE)? else {
        return Ok(false);
    };
    let legacy: LegacyGameState =
        serde_json::from_value(raw).map_err(|e| PersistenceError::Corrupt {
            key: keys::LEGACY_GAME_STATE.to_string(),
            message: e.to_string(),
        })?;
    let saved_at = legacy
        .last_saved
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .filter(|t| *t <= now)
        .unwrap_or(now);
    let economy = legacy.into_economy();

    write(store, keys::ECONOMY, &economy, saved_at)?;
    store.remove(keys::LEGACY_GAME_STATE)?;
    store.flush()?;
    info!(coins = economy.coins, "migrated legacy save");
    Ok(true)
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, serde_json::Value>,
    flushes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl Persistence for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, PersistenceError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        self.flushes += 1;
        Ok(())
    }
}
