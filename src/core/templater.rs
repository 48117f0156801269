//! Slot configuration rendering from the master configuration

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{FleetError, Result};

/// Marker in the master configuration replaced by the slot id
pub const PLACEHOLDER: &str = "INSTANCE_ID";

/// Name of the rendered configuration inside each slot directory
pub const SLOT_CONFIG_FILE: &str = "prpclient.ini";

/// Replace every occurrence of [`PLACEHOLDER`] with `slot_id`
pub fn substitute(master: &str, slot_id: u32) -> String {
    master.replace(PLACEHOLDER, &slot_id.to_string())
}

/// Render the master configuration into `slot_dir` and return the written path
pub fn render(master_path: &Path, slot_dir: &Path, slot_id: u32) -> Result<PathBuf> {
    let master = match fs::read_to_string(master_path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(FleetError::SlotTemplate {
                path: master_path.to_path_buf(),
            })
        }
        Err(e) => return Err(FleetError::io(master_path, e)),
    };

    let target = slot_dir.join(SLOT_CONFIG_FILE);
    fs::write(&target, substitute(&master, slot_id)).map_err(|e| FleetError::io(&target, e))?;

    debug!("Rendered slot {} configuration at {:?}", slot_id, target);
    Ok(target)
}
