//! Fleet - Install, start, stop and inspect all slots of one installation

use std::path::{Path, PathBuf};

use tracing::info;

use super::config_store::{self, MasterConfig};
use super::error::{FleetError, Result};
use super::identity::Identity;
use super::installer::Installer;
use super::process::{ProcessSupervisor, SignalSender};
use super::settings::Settings;
use super::slot::{Slot, SlotPool};
use super::status::{self, StatusEntry};

/// Central handle on an installation directory
pub struct Fleet {
    pool: SlotPool,
    supervisor: ProcessSupervisor,
}

impl Fleet {
    pub fn new(base: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            pool: SlotPool::new(base),
            supervisor: ProcessSupervisor::new()
                .with_launch(settings.launch.iter().cloned())
                .with_grace_period(settings.grace_period()),
        }
    }

    pub fn base(&self) -> &Path {
        self.pool.base()
    }

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    /// Install the client, stamp the identity into the master
    /// configuration and provision `slot_count` slots.
    ///
    /// Aborts on the first failing slot without undoing earlier ones.
    pub fn install(
        &self,
        installer: &dyn Installer,
        identity: &Identity,
        slot_count: usize,
    ) -> Result<Vec<Slot>> {
        identity.validate()?;
        installer.install(self.base())?;

        let master = self.pool.master_config_path();
        config_store::write(&master, &identity.updates())?;
        info!("Identity for {} written to {:?}", identity.userid, master);

        let slots = self.pool.provision(slot_count)?;
        info!("Installed {} slot(s)", slots.len());
        Ok(slots)
    }

    pub fn slots(&self) -> Result<Vec<Slot>> {
        self.pool.list()
    }

    /// Start the client in one slot
    pub fn start_slot(&self, id: u32) -> Result<Vec<u32>> {
        let slot = self
            .pool
            .get(id)?
            .ok_or(FleetError::UnknownSlot { slot_id: id })?;
        self.supervisor.start_slot(&slot)
    }

    /// Start every slot; per-slot failures are returned, not raised
    pub fn start_all(&self) -> Result<Vec<FleetError>> {
        self.supervisor.start_all(&self.pool)
    }

    pub fn stop_all(&self, sender: &dyn SignalSender) -> usize {
        self.supervisor.stop_all(sender)
    }

    pub fn status(&self) -> Result<Vec<StatusEntry>> {
        status::collect(&self.pool)
    }

    /// Raw work-record lines for every slot, in slot order
    pub fn work_lines(&self) -> Result<Vec<(u32, Vec<String>)>> {
        self.pool
            .ids()?
            .into_iter()
            .map(|id| Ok((id, status::work_lines(id, &self.pool.slot_dir(id))?)))
            .collect()
    }

    pub fn master_config(&self) -> Result<MasterConfig> {
        config_store::read(&self.pool.master_config_path())
    }

    /// The `userid` from the master configuration
    pub fn user(&self) -> Result<Option<String>> {
        Ok(self.master_config()?.get("userid").map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::slot::tests::installed_base;
    use crate::core::status::{SlotStatus, LOCK_FILE, WORK_RECORD_FILE};
    use std::fs;

    /// The executables and master configuration are already in place
    struct Preinstalled;

    impl Installer for Preinstalled {
        fn install(&self, _base: &Path) -> Result<()> {
            Ok(())
        }
    }

    struct Failing;

    impl Installer for Failing {
        fn install(&self, _base: &Path) -> Result<()> {
            Err(FleetError::InstallIncomplete {
                missing: vec![PathBuf::from("programs/llr")],
            })
        }
    }

    fn fleet(base: &Path) -> Fleet {
        Fleet::new(base, &Settings::default())
    }

    #[test]
    fn test_install_writes_identity_into_every_slot() {
        let base = installed_base();
        let fleet = fleet(base.path());
        let identity = Identity::new("a@b.com", "U1").unwrap();

        let slots = fleet.install(&Preinstalled, &identity, 2).unwrap();

        assert_eq!(slots.len(), 2);
        for slot in &slots {
            let text = fs::read_to_string(slot.config_path()).unwrap();
            assert!(text.contains("email=a@b.com\n"));
            assert!(text.contains("userid=U1\n"));
            assert!(text.contains(&format!("clientid=slot-{}\n", slot.id)));
        }
        assert_eq!(fleet.user().unwrap().as_deref(), Some("U1"));
    }

    #[test]
    fn test_slot_configs_differ_only_at_token() {
        let base = installed_base();
        let fleet = fleet(base.path());
        fleet
            .install(&Preinstalled, &Identity::new("a@b.com", "U1").unwrap(), 2)
            .unwrap();

        let one = fs::read_to_string(fleet.pool().slot_dir(1).join("prpclient.ini")).unwrap();
        let two = fs::read_to_string(fleet.pool().slot_dir(2).join("prpclient.ini")).unwrap();
        assert_eq!(one.replace("slot-1", "slot-2"), two);
    }

    #[test]
    fn test_install_stops_when_installer_fails() {
        let base = installed_base();
        let fleet = fleet(base.path());

        let err = fleet
            .install(&Failing, &Identity::new("a@b.com", "U1").unwrap(), 2)
            .unwrap_err();

        assert!(matches!(err, FleetError::InstallIncomplete { .. }));
        assert!(fleet.slots().unwrap().is_empty());
    }

    #[test]
    fn test_install_rejects_invalid_identity() {
        let base = installed_base();
        let identity = Identity {
            email: String::new(),
            userid: "U1".into(),
            machineid: String::new(),
            teamid: String::new(),
        };
        let err = fleet(base.path()).install(&Preinstalled, &identity, 1).unwrap_err();
        assert!(matches!(err, FleetError::InvalidIdentity(_)));
    }

    #[test]
    fn test_status_end_to_end() {
        let base = installed_base();
        let fleet = fleet(base.path());
        fleet
            .install(&Preinstalled, &Identity::new("a@b.com", "U1").unwrap(), 2)
            .unwrap();
        let pool = fleet.pool();
        fs::write(pool.slot_dir(2).join(LOCK_FILE), "").unwrap();
        fs::write(pool.slot_dir(1).join(WORK_RECORD_FILE), "End WorkUnit W100\n").unwrap();
        fs::write(pool.slot_dir(2).join(WORK_RECORD_FILE), "End WorkUnit W200\n").unwrap();

        let entries = fleet.status().unwrap();
        let view: Vec<(u32, &str, SlotStatus)> = entries
            .iter()
            .map(|e| (e.slot, e.unit.as_str(), e.status))
            .collect();
        assert_eq!(
            view,
            [
                (1, "W100", SlotStatus::Stopped),
                (2, "W200", SlotStatus::Running)
            ]
        );

        let lines = fleet.work_lines().unwrap();
        assert_eq!(
            lines,
            [
                (1, vec!["End WorkUnit W100".to_string()]),
                (2, vec!["End WorkUnit W200".to_string()])
            ]
        );
    }

    #[test]
    fn test_start_unknown_slot() {
        let base = installed_base();
        let err = fleet(base.path()).start_slot(3).unwrap_err();
        assert!(matches!(err, FleetError::UnknownSlot { slot_id: 3 }));
    }
}
