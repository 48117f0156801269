//! Process supervision - Launching and stopping slot clients

use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{info, warn};

use super::error::{FleetError, Result};
use super::slot::{Slot, SlotPool};
use crate::platform;

/// Executable launched in each slot
pub const PRIMARY_EXECUTABLE: &str = "prpclient";

/// Helper programs the primary client spawns; stopped before it
pub const AUXILIARY_EXECUTABLES: [&str; 8] = [
    "llr",
    "pfgw64",
    "genefer",
    "genefer80",
    "genefercuda",
    "genefx64",
    "wwww",
    "wwwwcl",
];

/// Wait between stopping the helpers and stopping the primary client
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Requests termination of every process running a given executable
pub trait SignalSender {
    /// Returns how many processes were signalled
    fn terminate(&self, executable: &str) -> usize;
}

/// Launches detached clients in slot directories.
///
/// Nothing here tracks the spawned processes; whether a slot is running is
/// only ever inferred from its lock file.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    launch: Vec<String>,
    grace_period: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self {
            launch: vec![PRIMARY_EXECUTABLE.to_string()],
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_launch<I, S>(mut self, executables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.launch = executables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Launch the configured executables in `slot`'s directory.
    ///
    /// Returns the PIDs of the spawned processes. A slot whose directory
    /// has disappeared is skipped.
    pub fn start_slot(&self, slot: &Slot) -> Result<Vec<u32>> {
        if !slot.directory.is_dir() {
            warn!("Slot {} directory {:?} is gone, not starting", slot.id, slot.directory);
            return Ok(Vec::new());
        }

        let mut pids = Vec::with_capacity(self.launch.len());
        for exe in &self.launch {
            let mut cmd = Command::new(slot.file(exe));
            cmd.current_dir(&slot.directory)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            platform::detach(&mut cmd);

            let child = cmd.spawn().map_err(|source| FleetError::Spawn {
                slot_id: slot.id,
                executable: exe.clone(),
                source,
            })?;
            info!("Started {} in slot {} (PID {})", exe, slot.id, child.id());
            pids.push(child.id());
        }
        Ok(pids)
    }

    /// Start every slot in ascending id order.
    ///
    /// A slot that fails to load or start does not stop the others; the
    /// failures are returned.
    pub fn start_all(&self, pool: &SlotPool) -> Result<Vec<FleetError>> {
        let mut failures = Vec::new();
        for id in pool.ids()? {
            let started = pool
                .get(id)
                .and_then(|slot| slot.map_or(Ok(Vec::new()), |slot| self.start_slot(&slot)));
            if let Err(e) = started {
                warn!("Slot {}: {}", id, e);
                failures.push(e);
            }
        }
        Ok(failures)
    }

    /// Stop every client on the host, helpers first.
    ///
    /// Returns the number of processes signalled in total.
    pub fn stop_all(&self, sender: &dyn SignalSender) -> usize {
        let mut signalled = 0;
        for exe in AUXILIARY_EXECUTABLES {
            signalled += sender.terminate(exe);
        }
        info!(
            "Signalled {} helper process(es), waiting {:?}",
            signalled, self.grace_period
        );
        std::thread::sleep(self.grace_period);

        let primary = sender.terminate(PRIMARY_EXECUTABLE);
        info!("Signalled {} {} process(es)", primary, PRIMARY_EXECUTABLE);
        signalled + primary
    }
}
