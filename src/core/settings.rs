//! Operator settings management

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{FleetError, Result};
use super::identity::Identity;
use super::process::{DEFAULT_GRACE_PERIOD, PRIMARY_EXECUTABLE};
use crate::platform;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Client installation directory
    pub base_directory: Option<PathBuf>,
    /// Number of slots to provision (None = one per logical CPU)
    pub slot_count: Option<usize>,
    /// Seconds between stopping helper programs and the client
    pub grace_period_secs: u64,
    /// Executables started in each slot
    pub launch: Vec<String>,
    /// Identity used when no command-line identity is given
    pub identity: Option<Identity>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_directory: None,
            slot_count: None,
            grace_period_secs: DEFAULT_GRACE_PERIOD.as_secs(),
            launch: vec![PRIMARY_EXECUTABLE.to_string()],
            identity: None,
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prpfleet")
            .join("settings.json")
    }

    /// Load settings from `path`; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No settings at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(FleetError::io(path, e)),
        };
        let mut settings: Self = serde_json::from_str(&text)?;
        settings.validate();
        Ok(settings)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get the base directory, using default if not set
    pub fn get_base_directory(&self) -> PathBuf {
        self.base_directory.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("prpclient")
        })
    }

    /// Slots to provision, defaulting to the host's CPU count
    pub fn get_slot_count(&self) -> usize {
        self.slot_count.unwrap_or_else(platform::cpu_count)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Validate settings and fix any invalid values
    pub fn validate(&mut self) {
        self.slot_count = self.slot_count.map(|n| n.max(1));
        if self.launch.is_empty() {
            self.launch.push(PRIMARY_EXECUTABLE.to_string());
        }
    }
}
