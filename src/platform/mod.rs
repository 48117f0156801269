//! Platform-specific process handling and host information

#[cfg(unix)]
pub mod unix;

use std::ffi::OsStr;
use std::process::Command;

use sysinfo::{CpuRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tracing::{debug, warn};

use crate::core::SignalSender;

/// Detach a command from our session before spawning
pub fn detach(cmd: &mut Command) {
    #[cfg(unix)]
    {
        unix::detach(cmd);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(0x00000008); // DETACHED_PROCESS
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = cmd;
    }
}

/// Number of logical processing units, never less than one
pub fn cpu_count() -> usize {
    let system =
        System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::new()));
    system.cpus().len().max(1)
}

/// Whether this build targets a 64-bit platform
pub fn is_64bit() -> bool {
    cfg!(target_pointer_width = "64")
}

/// Host process table; signals processes by exact executable name
pub struct ProcessTable {
    system: std::sync::Mutex<System>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            system: std::sync::Mutex::new(System::new()),
        }
    }

    fn pids_named(&self, name: &str) -> Vec<Pid> {
        let Ok(mut system) = self.system.lock() else {
            warn!("Process table lock poisoned");
            return Vec::new();
        };
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new(),
        );
        system
            .processes()
            .iter()
            .filter(|(_, proc)| proc.name() == OsStr::new(name))
            .map(|(pid, _)| *pid)
            .collect()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSender for ProcessTable {
    fn terminate(&self, executable: &str) -> usize {
        let mut signalled = 0;
        for pid in self.pids_named(executable) {
            match interrupt(pid) {
                Ok(()) => {
                    debug!("Interrupted {} (PID {})", executable, pid);
                    signalled += 1;
                }
                Err(e) => warn!("Failed to interrupt {} (PID {}): {}", executable, pid, e),
            }
        }
        signalled
    }
}

#[cfg(unix)]
fn interrupt(pid: Pid) -> std::io::Result<()> {
    unix::interrupt_process(pid.as_u32())
}

#[cfg(not(unix))]
fn interrupt(pid: Pid) -> std::io::Result<()> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    match system.process(pid).map(|p| p.kill()) {
        Some(true) => Ok(()),
        _ => Err(std::io::Error::other("process could not be signalled")),
    }
}
