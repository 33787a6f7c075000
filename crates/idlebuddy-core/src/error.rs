//! Core error types for idlebuddy-core.
//!
//! Every component has its own small error enum so callers can match on the
//! exact failure; [`CoreError`] wraps them all for code that only needs to
//! report.

use std::path::PathBuf;
use thiserror::Error;

use crate::battle::BattlePhase;
use crate::focus::FocusState;

/// Core error type for idlebuddy-core.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Purchase failed: {0}")]
    Purchase(#[from] PurchaseError),

    #[error("Lottery failed: {0}")]
    Lottery(#[from] LotteryError),

    #[error("Focus timer: {0}")]
    Transition(#[from] TransitionError),

    #[error("Deadline error: {0}")]
    Deadline(#[from] DeadlineError),

    #[error("Buddy error: {0}")]
    Buddy(#[from] BuddyError),

    #[error("Battle error: {0}")]
    Battle(#[from] BattleError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Event bus errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Reasons an upgrade purchase is refused. State is never touched on failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PurchaseError {
    #[error("Unknown upgrade: {0}")]
    UnknownUpgrade(String),

    #[error("Not enough coins: need {needed}, have {available}")]
    InsufficientCoins { needed: u64, available: u64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LotteryError {
    #[error("Not enough coins for a {tier} ticket: need {price}, have {available}")]
    InsufficientCoins {
        tier: String,
        price: u64,
        available: u64,
    },

    #[error("Prize table is empty")]
    EmptyPrizeTable,

    #[error("No drawn prize is waiting to be settled")]
    NothingToSettle,
}

/// A focus timer command issued from a state that does not accept it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: FocusState,
    },

    #[error("Invalid duration: {0} minutes")]
    InvalidDuration(u32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeadlineError {
    #[error("Task name must not be empty")]
    EmptyName,

    #[error("Unknown task: {0}")]
    UnknownTask(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuddyError {
    #[error("Unknown skin: {0}")]
    UnknownSkin(String),

    #[error("Skin '{0}' is still locked")]
    SkinLocked(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BattleError {
    #[error("cannot {action} while {phase:?}")]
    InvalidPhase {
        action: &'static str,
        phase: BattlePhase,
    },

    #[error("Wave number must be at least 1")]
    InvalidWave,
}

/// Save/load failures. In-memory state stays authoritative when these occur.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to open store at {path}: {message}")]
    OpenFailed { path: PathBuf, message: String },

    #[error("Store query failed: {0}")]
    QueryFailed(String),

    #[error("Corrupt value under '{key}': {message}")]
    Corrupt { key: String, message: String },

    #[error("Failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        PersistenceError::QueryFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
