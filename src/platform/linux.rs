//! Unix platform implementation
//!
//! Discovery sources and window management are Windows concepts; here they
//! report nothing so the indexer and controller still run against the drive
//! scan and plain process signals.

use std::path::{Path, PathBuf};
use std::process::Command;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use super::WindowHandle;
use crate::control::{ControlError, WindowAction};
use crate::indexer::sources::DiscoveryError;

const REAL_FILESYSTEMS: &[&str] = &[
    "ext4", "ext3", "xfs", "btrfs", "ntfs", "ntfs3", "vfat", "exfat", "fuseblk",
];

/// Mount points of real filesystems from `/proc/mounts`
pub fn mounted_volumes() -> Vec<PathBuf> {
    let mut mounts = Vec::new();

    if let Ok(content) = std::fs::read_to_string("/proc/mounts") {
        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                continue;
            }

            let mount_point = parts[1];
            if ["/proc", "/sys", "/dev", "/run"]
                .iter()
                .any(|prefix| mount_point.starts_with(prefix))
            {
                continue;
            }

            if REAL_FILESYSTEMS.contains(&parts[2]) {
                mounts.push(PathBuf::from(mount_point));
            }
        }
    }

    if mounts.is_empty() {
        mounts.push(PathBuf::from("/"));
    }

    mounts
}

pub fn uninstall_install_locations() -> Vec<String> {
    Vec::new()
}

pub fn start_menu_dirs() -> Vec<PathBuf> {
    Vec::new()
}

/// Shortcut resolution needs the Windows shell
pub struct ShellLinkResolver;

impl ShellLinkResolver {
    pub fn new() -> Result<Self, DiscoveryError> {
        Err(DiscoveryError::Unavailable(
            "shell links are not supported on this platform".to_string(),
        ))
    }

    pub fn resolve(&self, shortcut: &Path) -> Result<PathBuf, DiscoveryError> {
        Err(DiscoveryError::Unavailable(format!("{:?}", shortcut)))
    }
}

pub fn visible_windows() -> Vec<(WindowHandle, u32)> {
    Vec::new()
}

pub fn post_close(_window: WindowHandle) -> Result<(), ControlError> {
    Err(no_windows())
}

pub fn send_close_shortcut(_window: WindowHandle) -> Result<(), ControlError> {
    Err(no_windows())
}

pub fn show_window(_window: WindowHandle, _action: WindowAction) -> Result<(), ControlError> {
    Err(no_windows())
}

/// Check `pid` with the null signal
pub fn open_process(pid: u32) -> Result<(), ControlError> {
    signal_process(pid, None)
}

pub fn terminate_process(pid: u32) -> Result<(), ControlError> {
    signal_process(pid, Some(Signal::SIGTERM))
}

pub fn kill_process(pid: u32) -> Result<(), ControlError> {
    signal_process(pid, Some(Signal::SIGKILL))
}

/// Forced kill through the external `kill` utility
pub fn elevated_kill(pid: u32) -> Result<(), ControlError> {
    let output = Command::new("kill")
        .args(["-KILL", &pid.to_string()])
        .output()
        .map_err(|e| ControlError::Failed(format!("kill: {}", e)))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ControlError::Failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

fn signal_process(pid: u32, signal: Option<Signal>) -> Result<(), ControlError> {
    let raw = i32::try_from(pid).map_err(|_| ControlError::NotFound(format!("pid {}", pid)))?;
    match kill(Pid::from_raw(raw), signal) {
        Ok(()) => Ok(()),
        Err(Errno::EPERM) => Err(ControlError::PermissionDenied(format!("pid {}", pid))),
        Err(Errno::ESRCH) => Err(ControlError::NotFound(format!("pid {}", pid))),
        Err(e) => Err(ControlError::Failed(format!("pid {}: {}", pid, e))),
    }
}

fn no_windows() -> ControlError {
    ControlError::Unavailable("window management is not supported on this platform".to_string())
}
