//! Core module - Slot provisioning, client supervision and status collection

pub mod config_store;
mod error;
mod fleet;
mod identity;
pub mod installer;
mod process;
pub mod settings;
pub mod slot;
pub mod status;
pub mod templater;

pub use fleet::Fleet;
pub use identity::Identity;
pub use installer::ExtractedArchiveInstaller;
pub use process::SignalSender;
pub use settings::Settings;
