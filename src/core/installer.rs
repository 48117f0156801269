//! Client installation - Laying out `programs/` and the master configuration

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::error::{FleetError, Result};
use super::slot::{MASTER_CONFIG_FILE, PROGRAMS_DIR, REQUIRED_EXECUTABLES, SLOTS_DIR};
use crate::platform;

/// Puts the client executables and master configuration under a base directory.
///
/// After a successful `install`, `<base>/programs/<exe>` exists for every
/// required executable and `<base>/master_prpclient.ini` holds the default
/// configuration.
pub trait Installer {
    fn install(&self, base: &Path) -> Result<()>;
}

/// Name of the client archive directory for this platform
pub fn client_name() -> &'static str {
    if platform::is_64bit() {
        "prpclient-5.4.0a-linux_64"
    } else {
        "prpclient-5.4.0a-linux_32"
    }
}

/// Paths that must exist after an install, missing ones only
pub fn missing_artifacts(base: &Path) -> Vec<PathBuf> {
    let programs = base.join(PROGRAMS_DIR);
    REQUIRED_EXECUTABLES
        .iter()
        .map(|exe| programs.join(exe))
        .chain(std::iter::once(base.join(MASTER_CONFIG_FILE)))
        .filter(|p| !p.is_file())
        .collect()
}

/// Installs from a client archive already unpacked into
/// `<base>/programs/<client>/`.
///
/// Executables are moved up from `<client>/programs/` and the master
/// configuration from `<client>/`, after which the emptied archive
/// directories are removed. Downloading and unpacking the archive happen
/// elsewhere.
#[derive(Debug, Clone)]
pub struct ExtractedArchiveInstaller {
    client: String,
}

impl Default for ExtractedArchiveInstaller {
    fn default() -> Self {
        Self::new(client_name())
    }
}

impl ExtractedArchiveInstaller {
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
        }
    }

    pub fn archive_root(&self, base: &Path) -> PathBuf {
        base.join(PROGRAMS_DIR).join(&self.client)
    }
}

impl Installer for ExtractedArchiveInstaller {
    fn install(&self, base: &Path) -> Result<()> {
        for dir in [base.join(SLOTS_DIR), base.join(PROGRAMS_DIR)] {
            fs::create_dir_all(&dir).map_err(|e| FleetError::io(&dir, e))?;
        }

        let root = self.archive_root(base);
        let programs = base.join(PROGRAMS_DIR);
        for exe in REQUIRED_EXECUTABLES {
            move_artifact(&root.join(PROGRAMS_DIR).join(exe), &programs.join(exe))?;
        }
        move_artifact(&root.join(MASTER_CONFIG_FILE), &base.join(MASTER_CONFIG_FILE))?;

        remove_empty_dir(&root.join(PROGRAMS_DIR))?;
        remove_empty_dir(&root)?;

        let missing = missing_artifacts(base);
        if !missing.is_empty() {
            return Err(FleetError::InstallIncomplete { missing });
        }
        info!("Client {} installed under {:?}", self.client, base);
        Ok(())
    }
}

/// Move `from` to `to`; a source that is already gone is not an error
fn move_artifact(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => {
            debug!("Moved {:?} -> {:?}", from, to);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{:?} not present, skipping", from);
            Ok(())
        }
        Err(e) => Err(FleetError::io(from, e)),
    }
}

fn remove_empty_dir(dir: &Path) -> Result<()> {
    let mut entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(FleetError::io(dir, e)),
    };
    if entries.next().is_some() {
        warn!("Leaving non-empty archive directory {:?}", dir);
        return Ok(());
    }
    fs::remove_dir(dir).map_err(|e| FleetError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CLIENT: &str = "prpclient-test";

    fn unpacked_archive() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join(PROGRAMS_DIR).join(CLIENT);
        fs::create_dir_all(root.join(PROGRAMS_DIR)).unwrap();
        for exe in REQUIRED_EXECUTABLES {
            fs::write(root.join(PROGRAMS_DIR).join(exe), exe).unwrap();
        }
        fs::write(root.join(MASTER_CONFIG_FILE), "email=\n").unwrap();
        dir
    }

    #[test]
    fn test_install_flattens_archive_layout() {
        let base = unpacked_archive();
        let installer = ExtractedArchiveInstaller::new(CLIENT);

        installer.install(base.path()).unwrap();

        assert!(missing_artifacts(base.path()).is_empty());
        assert!(base.path().join(SLOTS_DIR).is_dir());
        assert!(!installer.archive_root(base.path()).exists());
        assert_eq!(
            fs::read_to_string(base.path().join(PROGRAMS_DIR).join("llr")).unwrap(),
            "llr"
        );
    }

    #[test]
    fn test_reinstall_tolerates_already_moved_artifacts() {
        let base = unpacked_archive();
        let installer = ExtractedArchiveInstaller::new(CLIENT);
        installer.install(base.path()).unwrap();

        installer.install(base.path()).unwrap();
        assert!(missing_artifacts(base.path()).is_empty());
    }

    #[test]
    fn test_install_reports_missing_artifacts() {
        let base = unpacked_archive();
        let root = base.path().join(PROGRAMS_DIR).join(CLIENT);
        fs::remove_file(root.join(PROGRAMS_DIR).join("pfgw64")).unwrap();

        let err = ExtractedArchiveInstaller::new(CLIENT)
            .install(base.path())
            .unwrap_err();
        match err {
            FleetError::InstallIncomplete { missing } => {
                assert_eq!(missing, [base.path().join(PROGRAMS_DIR).join("pfgw64")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_install_keeps_non_empty_archive_dir() {
        let base = unpacked_archive();
        let root = base.path().join(PROGRAMS_DIR).join(CLIENT);
        fs::write(root.join("README"), "docs").unwrap();

        ExtractedArchiveInstaller::new(CLIENT)
            .install(base.path())
            .unwrap();
        assert!(root.join("README").is_file());
        assert!(!root.join(PROGRAMS_DIR).exists());
    }

    #[test]
    fn test_client_name_matches_pointer_width() {
        assert!(client_name().starts_with("prpclient-5.4.0a-linux_"));
    }
}
