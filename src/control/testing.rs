//! Scripted backend and prompt for controller tests

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use super::{ControlError, ProcessBackend, ProcessEntry, Prompt, WindowAction};
use crate::platform::WindowHandle;

/// Soft close steps a process reacts to, in ladder order
const SOFT_STEPS: [&str; 3] = ["post_close", "shortcut", "terminate"];

#[derive(Debug, Clone)]
pub struct FakeProcess {
    pub pid: u32,
    pub name: String,
    pub cmd: Vec<String>,
    pub windows: Vec<isize>,
    /// Soft steps survived before exiting; 3 means only a kill works
    pub survives: usize,
    pub denied: bool,
    pub name_denied: bool,
    /// Listed, but gone by the time a handle is opened
    pub vanished: bool,
    pub alive: bool,
    soft_hits: usize,
}

impl FakeProcess {
    pub fn new(pid: u32, name: &str) -> Self {
        Self {
            pid,
            name: name.to_string(),
            cmd: Vec::new(),
            windows: Vec::new(),
            survives: 0,
            denied: false,
            name_denied: false,
            vanished: false,
            alive: true,
            soft_hits: 0,
        }
    }

    pub fn with_window(mut self, handle: isize) -> Self {
        self.windows.push(handle);
        self
    }

    pub fn with_cmd(mut self, cmd: &str) -> Self {
        self.cmd = cmd.split_whitespace().map(String::from).collect();
        self
    }

    pub fn surviving(mut self, steps: usize) -> Self {
        self.survives = steps;
        self
    }

    pub fn denied(mut self) -> Self {
        self.denied = true;
        self
    }

    pub fn name_denied(mut self) -> Self {
        self.name_denied = true;
        self
    }

    pub fn vanished(mut self) -> Self {
        self.vanished = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    pub processes: Vec<FakeProcess>,
    pub log: Vec<String>,
    pub elevated_fails: bool,
    /// Calls to `processes`
    pub listings: usize,
}

impl ScriptedBackend {
    pub fn add(&mut self, process: FakeProcess) {
        self.processes.push(process);
    }

    pub fn is_alive(&self, pid: u32) -> bool {
        self.processes.iter().any(|p| p.pid == pid && p.alive)
    }

    fn by_pid(&mut self, pid: u32) -> Result<&mut FakeProcess, ControlError> {
        self.processes
            .iter_mut()
            .find(|p| p.pid == pid && p.alive)
            .ok_or_else(|| ControlError::NotFound(format!("pid {}", pid)))
    }

    fn owner_of(&mut self, window: WindowHandle) -> Option<&mut FakeProcess> {
        self.processes
            .iter_mut()
            .find(|p| p.alive && p.windows.contains(&window.0))
    }

    fn soft_step(process: &mut FakeProcess) {
        process.soft_hits += 1;
        if process.soft_hits > process.survives {
            process.alive = false;
        }
    }
}

impl ProcessBackend for ScriptedBackend {
    fn processes(&mut self) -> Vec<ProcessEntry> {
        self.listings += 1;
        self.processes
            .iter()
            .filter(|p| p.alive)
            .map(|p| ProcessEntry {
                pid: p.pid,
                name: p.name.clone(),
                cmd: p.cmd.clone(),
            })
            .collect()
    }

    fn visible_windows(&mut self) -> Vec<(WindowHandle, u32)> {
        self.processes
            .iter()
            .filter(|p| p.alive)
            .flat_map(|p| p.windows.iter().map(move |w| (WindowHandle(*w), p.pid)))
            .collect()
    }

    fn process_name(&mut self, pid: u32) -> Result<String, ControlError> {
        let process = self.by_pid(pid)?;
        if process.name_denied {
            return Err(ControlError::PermissionDenied(format!("pid {}", pid)));
        }
        Ok(format!("{}.exe", process.name))
    }

    fn open(&mut self, pid: u32) -> Result<(), ControlError> {
        let process = self.by_pid(pid)?;
        if process.vanished {
            return Err(ControlError::NotFound(format!("pid {}", pid)));
        }
        if process.denied {
            return Err(ControlError::PermissionDenied(format!("pid {}", pid)));
        }
        Ok(())
    }

    fn post_close(&mut self, window: WindowHandle) -> Result<(), ControlError> {
        self.log.push(format!("{} {}", SOFT_STEPS[0], window.0));
        if let Some(process) = self.owner_of(window) {
            Self::soft_step(process);
        }
        Ok(())
    }

    fn send_close_shortcut(&mut self, window: WindowHandle) -> Result<(), ControlError> {
        self.log.push(format!("{} {}", SOFT_STEPS[1], window.0));
        if let Some(process) = self.owner_of(window) {
            Self::soft_step(process);
        }
        Ok(())
    }

    fn terminate(&mut self, pid: u32) -> Result<(), ControlError> {
        self.log.push(format!("{} {}", SOFT_STEPS[2], pid));
        let process = self.by_pid(pid)?;
        // windowless processes only see this step
        if process.windows.is_empty() {
            process.soft_hits = process.soft_hits.max(2);
        }
        Self::soft_step(process);
        Ok(())
    }

    fn kill(&mut self, pid: u32) -> Result<(), ControlError> {
        self.log.push(format!("kill {}", pid));
        self.by_pid(pid)?.alive = false;
        Ok(())
    }

    fn elevated_kill(&mut self, pid: u32) -> Result<(), ControlError> {
        self.log.push(format!("elevated_kill {}", pid));
        if self.elevated_fails {
            return Err(ControlError::Failed("access is denied".to_string()));
        }
        self.by_pid(pid)?.alive = false;
        Ok(())
    }

    fn wait_for_exit(&mut self, pid: u32, timeout: Duration) -> Result<(), ControlError> {
        if self.is_alive(pid) {
            Err(ControlError::Timeout(timeout))
        } else {
            Ok(())
        }
    }

    fn set_window_state(&mut self, window: WindowHandle, action: WindowAction) -> Result<(), ControlError> {
        self.log.push(format!("{} {}", action.label(), window.0));
        Ok(())
    }

    fn launch(&mut self, path: &Path) -> Result<(), ControlError> {
        self.log.push(format!("launch {}", path.display()));
        Ok(())
    }
}

/// Answers questions from a queue and records everything shown
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    pub said: Vec<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl Prompt for ScriptedPrompt {
    fn say(&mut self, line: &str) {
        self.said.push(line.to_string());
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        self.asked.push(question.to_string());
        self.answers.pop_front()
    }
}
