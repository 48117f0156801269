//! Slot pool - One isolated working directory per client

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::config_store::{self, MasterConfig};
use super::error::{FleetError, Result};
use super::templater::{self, SLOT_CONFIG_FILE};

/// Directory under the base holding one subdirectory per slot
pub const SLOTS_DIR: &str = "slots";

/// Directory under the base holding the shared executables
pub const PROGRAMS_DIR: &str = "programs";

/// Master configuration file under the base
pub const MASTER_CONFIG_FILE: &str = "master_prpclient.ini";

/// Executables copied into every slot
pub const REQUIRED_EXECUTABLES: [&str; 5] = ["llr", "pfgw64", "prpclient", "wwww", "wwwwcl"];

/// A provisioned client slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    /// 1-based slot number
    pub id: u32,
    /// Working directory owned by this slot
    pub directory: PathBuf,
    /// Rendered slot configuration
    pub config: MasterConfig,
    /// Executables present in the slot directory
    pub executables: Vec<String>,
}

impl Slot {
    pub fn config_path(&self) -> PathBuf {
        self.directory.join(SLOT_CONFIG_FILE)
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

/// The set of slots below `<base>/slots`
#[derive(Debug, Clone)]
pub struct SlotPool {
    base: PathBuf,
    executables: Vec<String>,
}

impl SlotPool {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            executables: REQUIRED_EXECUTABLES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Use a custom executable set instead of [`REQUIRED_EXECUTABLES`]
    pub fn with_executables<I, S>(mut self, executables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.executables = executables.into_iter().map(Into::into).collect();
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn executables(&self) -> &[String] {
        &self.executables
    }

    pub fn slots_dir(&self) -> PathBuf {
        self.base.join(SLOTS_DIR)
    }

    pub fn programs_dir(&self) -> PathBuf {
        self.base.join(PROGRAMS_DIR)
    }

    pub fn master_config_path(&self) -> PathBuf {
        self.base.join(MASTER_CONFIG_FILE)
    }

    pub fn slot_dir(&self, id: u32) -> PathBuf {
        self.slots_dir().join(id.to_string())
    }

    /// Create slots `1..=slot_count`, strictly in ascending order.
    ///
    /// Stops at the first slot that cannot be populated. Slots created
    /// before the failure are left in place and the failing slot may be
    /// partially populated.
    pub fn provision(&self, slot_count: usize) -> Result<Vec<Slot>> {
        let slots_dir = self.slots_dir();
        fs::create_dir_all(&slots_dir).map_err(|e| FleetError::io(&slots_dir, e))?;

        info!(
            "Provisioning {} slot(s) under {:?}",
            slot_count, slots_dir
        );

        let mut slots = Vec::with_capacity(slot_count);
        for id in (1..=slot_count).map(|n| n as u32) {
            let slot = self
                .provision_slot(id)
                .map_err(|e| FleetError::provision(id, e))?;
            slots.push(slot);
        }
        Ok(slots)
    }

    fn provision_slot(&self, id: u32) -> Result<Slot> {
        let dir = self.slot_dir(id);
        fs::create_dir_all(&dir).map_err(|e| FleetError::io(&dir, e))?;

        let programs = self.programs_dir();
        for exe in &self.executables {
            let from = programs.join(exe);
            let to = dir.join(exe);
            fs::copy(&from, &to).map_err(|e| FleetError::io(&from, e))?;
        }

        let config_path = templater::render(&self.master_config_path(), &dir, id)?;
        let config = config_store::read(&config_path)?;

        debug!("Slot {} ready at {:?}", id, dir);
        Ok(Slot {
            id,
            directory: dir,
            config,
            executables: self.executables.clone(),
        })
    }

    /// Slot ids found on disk, in ascending numeric order.
    ///
    /// Entries whose name is not a decimal number are ignored.
    pub fn ids(&self) -> Result<Vec<u32>> {
        let slots_dir = self.slots_dir();
        let entries = match fs::read_dir(&slots_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FleetError::io(&slots_dir, e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FleetError::io(&slots_dir, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(parse_slot_name) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Load a single slot from disk
    pub fn get(&self, id: u32) -> Result<Option<Slot>> {
        let dir = self.slot_dir(id);
        if !dir.is_dir() {
            return Ok(None);
        }
        let config = config_store::read(&dir.join(SLOT_CONFIG_FILE))?;
        let executables = self
            .executables
            .iter()
            .filter(|exe| dir.join(exe.as_str()).is_file())
            .cloned()
            .collect();
        Ok(Some(Slot {
            id,
            directory: dir,
            config,
            executables,
        }))
    }

    /// All slots on disk, ordered by numeric id
    pub fn list(&self) -> Result<Vec<Slot>> {
        let mut slots = Vec::new();
        for id in self.ids()? {
            if let Some(slot) = self.get(id)? {
                slots.push(slot);
            }
        }
        Ok(slots)
    }
}

/// Parse a slot directory name; ids start at 1
fn parse_slot_name(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok().filter(|id| *id > 0)
}
