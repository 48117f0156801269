//! Unix process plumbing

use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;

/// Start the child in its own session so it outlives the launcher
pub fn detach(cmd: &mut Command) {
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }
}

/// Ask a process to stop (SIGINT, as from the terminal)
pub fn interrupt_process(pid: u32) -> io::Result<()> {
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
