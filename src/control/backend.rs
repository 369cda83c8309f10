//! OS access for the controller

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};

use super::{ControlError, WindowAction};
use crate::model::strip_exe;
use crate::platform::{self, WindowHandle};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One running process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Lowercased, without the executable extension
    pub name: String,
    pub cmd: Vec<String>,
}

impl ProcessEntry {
    pub fn command_line(&self) -> String {
        self.cmd.join(" ")
    }
}

/// Process table, window, and signal primitives
pub trait ProcessBackend {
    fn processes(&mut self) -> Vec<ProcessEntry>;

    fn visible_windows(&mut self) -> Vec<(WindowHandle, u32)>;

    /// Raw process name of `pid`
    fn process_name(&mut self, pid: u32) -> Result<String, ControlError>;

    /// Obtain a handle with terminate rights, or report why not
    fn open(&mut self, pid: u32) -> Result<(), ControlError>;

    fn post_close(&mut self, window: WindowHandle) -> Result<(), ControlError>;

    fn send_close_shortcut(&mut self, window: WindowHandle) -> Result<(), ControlError>;

    /// Polite termination request
    fn terminate(&mut self, pid: u32) -> Result<(), ControlError>;

    fn kill(&mut self, pid: u32) -> Result<(), ControlError>;

    /// Forced kill through the external utility
    fn elevated_kill(&mut self, pid: u32) -> Result<(), ControlError>;

    /// `Ok` once `pid` is gone, `Timeout` otherwise
    fn wait_for_exit(&mut self, pid: u32, timeout: Duration) -> Result<(), ControlError>;

    fn set_window_state(&mut self, window: WindowHandle, action: WindowAction) -> Result<(), ControlError>;

    /// Start `path` detached from the console
    fn launch(&mut self, path: &Path) -> Result<(), ControlError>;
}

/// The live machine: `sysinfo` for the process table, the platform layer for
/// everything else
pub struct SystemBackend {
    system: System,
}

impl SystemBackend {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    fn refresh_pid(&mut self, pid: u32) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[Pid::from_u32(pid)]),
            true,
            ProcessRefreshKind::nothing(),
        );
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.system
            .process(Pid::from_u32(pid))
            .is_some_and(|process| process.status() != ProcessStatus::Zombie)
    }
}

impl Default for SystemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessBackend for SystemBackend {
    fn processes(&mut self) -> Vec<ProcessEntry> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::OnlyIfNotSet),
        );

        self.system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: strip_exe(&process.name().to_string_lossy()),
                cmd: process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().to_string())
                    .collect(),
            })
            .collect()
    }

    fn visible_windows(&mut self) -> Vec<(WindowHandle, u32)> {
        platform::visible_windows()
    }

    fn process_name(&mut self, pid: u32) -> Result<String, ControlError> {
        self.refresh_pid(pid);
        self.system
            .process(Pid::from_u32(pid))
            .map(|process| process.name().to_string_lossy().to_string())
            .ok_or_else(|| ControlError::NotFound(format!("pid {}", pid)))
    }

    fn open(&mut self, pid: u32) -> Result<(), ControlError> {
        platform::open_process(pid)
    }

    fn post_close(&mut self, window: WindowHandle) -> Result<(), ControlError> {
        platform::post_close(window)
    }

    fn send_close_shortcut(&mut self, window: WindowHandle) -> Result<(), ControlError> {
        platform::send_close_shortcut(window)
    }

    fn terminate(&mut self, pid: u32) -> Result<(), ControlError> {
        platform::terminate_process(pid)
    }

    fn kill(&mut self, pid: u32) -> Result<(), ControlError> {
        platform::kill_process(pid)
    }

    fn elevated_kill(&mut self, pid: u32) -> Result<(), ControlError> {
        platform::elevated_kill(pid)
    }

    fn wait_for_exit(&mut self, pid: u32, timeout: Duration) -> Result<(), ControlError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.refresh_pid(pid);
            if !self.is_alive(pid) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ControlError::Timeout(timeout));
            }
            std::thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    fn set_window_state(&mut self, window: WindowHandle, action: WindowAction) -> Result<(), ControlError> {
        platform::show_window(window, action)
    }

    fn launch(&mut self, path: &Path) -> Result<(), ControlError> {
        Command::new(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_child| ())
            .map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => {
                    ControlError::PermissionDenied(path.display().to_string())
                }
                io::ErrorKind::NotFound => ControlError::NotFound(path.display().to_string()),
                _ => ControlError::Failed(format!("{}: {}", path.display(), e)),
            })
    }
}
