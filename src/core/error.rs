//! Error types for slot provisioning, supervision and status collection

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("{}:{line}: expected key=value, found {content:?}", .path.display())]
    ConfigFormat {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("configuration file not found: {}", .path.display())]
    ConfigMissing { path: PathBuf },

    #[error("master configuration missing, cannot render slot config: {}", .path.display())]
    SlotTemplate { path: PathBuf },

    #[error("failed to provision slot {slot_id}: {source}")]
    SlotProvision {
        slot_id: u32,
        #[source]
        source: Box<FleetError>,
    },

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("install incomplete, missing: {}", display_paths(.missing))]
    InstallIncomplete { missing: Vec<PathBuf> },

    #[error("slot {slot_id} does not exist")]
    UnknownSlot { slot_id: u32 },

    #[error("failed to start {executable} in slot {slot_id}: {source}")]
    Spawn {
        slot_id: u32,
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

impl FleetError {
    /// Attach the offending path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap any error raised while populating a slot
    pub fn provision(slot_id: u32, source: FleetError) -> Self {
        Self::SlotProvision {
            slot_id,
            source: Box::new(source),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, FleetError>;
