//! Closing apps by name
//!
//! Ordinary apps go through an escalation ladder: close message, Alt+F4,
//! termination request, then a confirmed kill. Browsers only get the close
//! message on their first window, after a tab-count check, so the browser
//! can save its session.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ControlError, ProcessBackend, ProcessController, ProcessEntry, Prompt};
use crate::model::strip_exe;

const RENDERER_FLAG: &str = "--type=renderer";

/// Names closed and names left running by one close command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseReport {
    pub closed: Vec<String>,
    pub failed: Vec<String>,
}

impl CloseReport {
    fn record_closed(&mut self, name: &str) {
        if !self.closed.iter().any(|n| n == name) {
            self.closed.push(name.to_string());
        }
    }

    fn record_failed(&mut self, name: &str) {
        if !self.failed.iter().any(|n| n == name) {
            self.failed.push(name.to_string());
        }
    }
}

impl fmt::Display for CloseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        if !self.closed.is_empty() {
            lines.push(format!("Closed: {}", self.closed.join(", ")));
        }
        if !self.failed.is_empty() {
            lines.push(format!("Could not close: {}", self.failed.join(", ")));
        }
        write!(f, "{}", lines.join("\n"))
    }
}

/// Result of `close_by_name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    NotRunning(String),
    NoBrowserWindow(String),
    BrowserCancelled { name: String, tabs: usize },
    BrowserSignalled { name: String, tabs: usize },
    Batch(CloseReport),
}

impl fmt::Display for CloseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseOutcome::NotRunning(name) => write!(f, "'{}' is not running", name),
            CloseOutcome::NoBrowserWindow(name) => write!(f, "No '{}' window found", name),
            CloseOutcome::BrowserCancelled { name, .. } => write!(f, "Left '{}' open", name),
            CloseOutcome::BrowserSignalled { name, tabs } => {
                write!(f, "Asked '{}' to close ({} tabs)", name, tabs)
            }
            CloseOutcome::Batch(report) => write!(f, "{}", report),
        }
    }
}

/// Running processes grouped by name, keeping the last pid seen per name
fn running_by_name(processes: Vec<ProcessEntry>) -> Vec<(String, u32)> {
    let mut grouped: Vec<(String, u32)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for process in processes {
        match positions.get(&process.name) {
            Some(&i) => grouped[i].1 = process.pid,
            None => {
                positions.insert(process.name.clone(), grouped.len());
                grouped.push((process.name, process.pid));
            }
        }
    }

    grouped
}

impl<B: ProcessBackend, P: Prompt> ProcessController<B, P> {
    /// Close every running process whose name contains `name`
    pub fn close_by_name(&mut self, name: &str) -> CloseOutcome {
        let needle = strip_exe(name);
        if needle.is_empty() {
            return CloseOutcome::NotRunning(name.to_string());
        }

        let matches: Vec<(String, u32)> = running_by_name(self.backend.processes())
            .into_iter()
            .filter(|(process_name, _)| process_name.contains(&needle))
            .collect();

        if matches.is_empty() {
            return CloseOutcome::NotRunning(name.to_string());
        }

        if self.is_browser(&needle) {
            return self.close_browser(&needle);
        }

        let mut report = CloseReport::default();
        for (process_name, pid) in matches {
            match self.close_process(&process_name, pid) {
                Ok(()) => report.record_closed(&process_name),
                Err(ControlError::NotFound(_)) => {
                    debug!("{} (pid {}) exited before it could be closed", process_name, pid);
                }
                Err(e) => {
                    debug!("Could not close {} (pid {}): {}", process_name, pid, e);
                    report.record_failed(&process_name);
                }
            }
        }

        if report.closed.is_empty() && report.failed.is_empty() {
            return CloseOutcome::NotRunning(name.to_string());
        }
        CloseOutcome::Batch(report)
    }

    fn is_browser(&self, needle: &str) -> bool {
        self.config
            .browsers
            .iter()
            .any(|browser| needle.contains(browser.as_str()))
    }

    fn close_browser(&mut self, needle: &str) -> CloseOutcome {
        let windows = self.find_windows(needle);
        let Some(&first) = windows.first() else {
            return CloseOutcome::NoBrowserWindow(needle.to_string());
        };

        let tabs = self
            .backend
            .processes()
            .iter()
            .filter(|p| p.name.contains(needle) && p.command_line().contains(RENDERER_FLAG))
            .count();

        if tabs > self.config.browser_tab_threshold
            && !self
                .prompt
                .confirm(&format!("Browser has ~{} open tabs. Close anyway?", tabs))
        {
            return CloseOutcome::BrowserCancelled {
                name: needle.to_string(),
                tabs,
            };
        }

        match self.backend.post_close(first) {
            Ok(()) => CloseOutcome::BrowserSignalled {
                name: needle.to_string(),
                tabs,
            },
            Err(e) => {
                warn!("Failed to signal {}: {}", needle, e);
                let mut report = CloseReport::default();
                report.record_failed(needle);
                CloseOutcome::Batch(report)
            }
        }
    }

    /// Ladder for one process, falling back to a forced kill on access denied
    fn close_process(&mut self, name: &str, pid: u32) -> Result<(), ControlError> {
        match self.escalate(name, pid) {
            Err(ControlError::PermissionDenied(reason)) => {
                info!("Access denied to {} ({}), using forced kill", name, reason);
                self.prompt
                    .say(&format!("Access denied to '{}', trying forced kill...", name));
                self.backend.elevated_kill(pid)
            }
            other => other,
        }
    }

    fn escalate(&mut self, name: &str, pid: u32) -> Result<(), ControlError> {
        self.backend.open(pid)?;

        let window = self.find_windows(name).first().copied();

        if let Some(window) = window {
            if let Err(e) = self.backend.post_close(window) {
                debug!("WM_CLOSE to {} failed: {}", name, e);
            }
            if self.exited(pid, self.config.close_wait_secs) {
                debug!("{} closed after close message", name);
                return Ok(());
            }

            if let Err(e) = self.backend.send_close_shortcut(window) {
                debug!("Alt+F4 to {} failed: {}", name, e);
            }
            if self.exited(pid, self.config.shortcut_wait_secs) {
                debug!("{} closed after Alt+F4", name);
                return Ok(());
            }
        }

        self.backend.terminate(pid)?;
        if self.exited(pid, self.config.terminate_wait_secs) {
            debug!("{} terminated", name);
            return Ok(());
        }

        if !self
            .prompt
            .confirm(&format!("'{}' is not responding. Force close?", name))
        {
            self.prompt.say(&format!("Skipped '{}'", name));
            return Err(ControlError::UserCancelled);
        }

        self.backend.kill(pid)?;
        self.prompt.say(&format!("Force closed '{}'", name));
        Ok(())
    }

    fn exited(&mut self, pid: u32, wait_secs: u64) -> bool {
        self.backend
            .wait_for_exit(pid, Duration::from_secs(wait_secs))
            .is_ok()
    }
}
