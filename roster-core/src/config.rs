//! Runtime configuration, read from `<home>/.roster/config.yaml`.
//!
//! Every field has a default, so a missing file or a partial document is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::shift::RoleCheck;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Quiet interval after the last edit before changes are persisted.
    pub save_debounce_ms: u64,
    /// Quiet interval before a schedule-date change starts loading.
    pub date_change_debounce_ms: u64,
    /// Delay between a bulk roster load and ledger re-derivation.
    pub rederive_delay_ms: u64,
    /// Prior dates loaded and indexed alongside the active one.
    pub history_days: u32,
    /// Hour the operational day starts; drives shift presentation order.
    pub day_start_hour: u8,
    pub enforce_roles: bool,
    pub auto_save: bool,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 1_000,
            date_change_debounce_ms: 250,
            rederive_delay_ms: 50,
            history_days: 3,
            day_start_hour: 6,
            enforce_roles: true,
            auto_save: true,
        }
    }
}

impl RosterConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn date_change_debounce(&self) -> Duration {
        Duration::from_millis(self.date_change_debounce_ms)
    }

    pub fn rederive_delay(&self) -> Duration {
        Duration::from_millis(self.rederive_delay_ms)
    }

    pub fn role_check(&self) -> RoleCheck {
        RoleCheck::from_enabled(self.enforce_roles)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.day_start_hour > 23 {
            return Err(StoreError::Config(format!(
                "day_start_hour must be below 24, got {}",
                self.day_start_hour
            )));
        }
        Ok(())
    }
}

/// `<home>/.roster/config.yaml`, pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".roster").join("config.yaml")
}

/// Loads the configuration, falling back to defaults when the file is absent.
pub fn load_at(home: &Path) -> Result<RosterConfig, StoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(RosterConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let config: RosterConfig =
        serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })?;
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<RosterConfig, StoreError> {
    let home = dirs::home_dir().ok_or(StoreError::HomeNotFound)?;
    load_at(&home)
}
