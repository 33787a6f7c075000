mod config;
pub mod database;
pub mod persistence;

pub use config::{
    BattleConfig, BuddyConfig, Config, DeadlineConfig, EconomyConfig, FocusConfig, StorageConfig,
};
pub use database::{Database, SessionRecord, Stats};
pub use persistence::{keys, MemoryStore, Persistence, SaveEnvelope, SAVE_VERSION};

use std::path::PathBuf;

/// Returns `$IDLEBUDDY_DATA_DIR` if set, otherwise `~/.config/idlebuddy[-dev]/`
/// based on IDLEBUDDY_ENV.
///
/// Set IDLEBUDDY_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("IDLEBUDDY_DATA_DIR") {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("IDLEBUDDY_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("idlebuddy-dev")
            } else {
                base_dir.join("idlebuddy")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
