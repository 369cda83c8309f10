//! Process and window control
//!
//! Launching, closing, and arranging windows of indexed apps. All OS access
//! goes through [`ProcessBackend`] and all user interaction through
//! [`Prompt`].

mod backend;
mod close;
mod prompt;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{ProcessBackend, ProcessEntry, SystemBackend};
pub use prompt::{ConsolePrompt, Prompt};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::ControlConfig;
use crate::model::{strip_exe, AppRecord};
use crate::platform::WindowHandle;

/// Failures from process and window operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cancelled by user")]
    UserCancelled,

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),
}

/// Window state changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
    Minimize,
    Maximize,
    Restore,
}

impl WindowAction {
    pub fn label(&self) -> &'static str {
        match self {
            WindowAction::Minimize => "minimize",
            WindowAction::Maximize => "maximize",
            WindowAction::Restore => "restore",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            WindowAction::Minimize => "Minimized",
            WindowAction::Maximize => "Maximized",
            WindowAction::Restore => "Restored",
        }
    }
}

impl fmt::Display for WindowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Drives processes and windows on behalf of the console
pub struct ProcessController<B: ProcessBackend, P: Prompt> {
    backend: B,
    prompt: P,
    config: ControlConfig,
}

impl<B: ProcessBackend, P: Prompt> ProcessController<B, P> {
    pub fn new(backend: B, prompt: P, config: ControlConfig) -> Self {
        Self {
            backend,
            prompt,
            config,
        }
    }

    pub fn prompt(&mut self) -> &mut P {
        &mut self.prompt
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Visible windows whose owning process name contains `name`
    pub fn find_windows(&mut self, name: &str) -> Vec<WindowHandle> {
        let needle = strip_exe(name);
        if needle.is_empty() {
            return Vec::new();
        }
        let backend = &mut self.backend;
        let mut owners: HashMap<u32, Option<String>> = HashMap::new();
        let mut found = Vec::new();

        for (window, pid) in backend.visible_windows() {
            let owner = owners.entry(pid).or_insert_with(|| {
                match backend.process_name(pid) {
                    Ok(name) => Some(name.to_lowercase()),
                    Err(ControlError::NotFound(_)) | Err(ControlError::PermissionDenied(_)) => None,
                    Err(e) => {
                        debug!("Skipping window {:?} of pid {}: {}", window, pid, e);
                        None
                    }
                }
            });

            if owner.as_deref().is_some_and(|owner| owner.contains(&needle)) {
                found.push(window);
            }
        }

        found
    }

    /// Whether a process with exactly this (stripped) name is running
    pub fn is_running(&mut self, name: &str) -> bool {
        let wanted = strip_exe(name);
        self.backend
            .processes()
            .iter()
            .any(|process| process.name == wanted)
    }

    /// Names of all running processes, from a single listing
    pub fn running_names(&mut self) -> HashSet<String> {
        self.backend
            .processes()
            .into_iter()
            .map(|process| process.name)
            .collect()
    }

    /// Launch `app`, asking first when an instance is already running
    pub fn open_app(&mut self, app: &AppRecord) -> Result<(), ControlError> {
        if !app.exists() {
            return Err(ControlError::NotFound(format!(
                "{} (file removed, run 'reindex')",
                app.path
            )));
        }

        if self.is_running(&app.exe) {
            self.prompt
                .say(&format!("'{}' is already running!", app.name));
            if !self.prompt.confirm("Open another instance?") {
                return Err(ControlError::UserCancelled);
            }
        }

        self.backend.launch(Path::new(&app.path))?;
        Ok(())
    }

    /// Apply `action` to every matching window; returns how many were touched
    pub fn window_action(&mut self, name: &str, action: WindowAction) -> Result<usize, ControlError> {
        if strip_exe(name).is_empty() {
            return Err(ControlError::NotFound(format!("no window for '{}'", name)));
        }
        let windows = self.find_windows(name);
        if windows.is_empty() {
            return Err(ControlError::NotFound(format!("no window for '{}'", name)));
        }

        for window in &windows {
            self.backend.set_window_state(*window, action)?;
        }
        Ok(windows.len())
    }

    /// Let the user choose among search results
    pub fn pick(&mut self, results: &[AppRecord]) -> Option<AppRecord> {
        match results {
            [] => None,
            [only] => Some(only.clone()),
            _ => {
                self.prompt
                    .say(&format!("Found {} matching apps:", results.len()));
                let running = self.running_names();
                for (i, app) in results.iter().enumerate() {
                    let status = if running.contains(&strip_exe(&app.exe)) {
                        " [RUNNING]"
                    } else {
                        ""
                    };
                    self.prompt.say(&format!(
                        "  {}. {}{} ({} KB) -> {}",
                        i + 1,
                        app.name,
                        status,
                        app.size_kb,
                        app.path
                    ));
                }

                let answer = self.prompt.ask("Pick a number (Enter to cancel): ")?;
                let answer = answer.trim();
                if answer.is_empty() {
                    return None;
                }

                match answer.parse::<usize>() {
                    Ok(choice) if (1..=results.len()).contains(&choice) => {
                        Some(results[choice - 1].clone())
                    }
                    _ => {
                        self.prompt.say("Invalid choice");
                        None
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeProcess, ScriptedBackend, ScriptedPrompt};
    use super::*;
    use crate::model::AppSource;

    fn controller(
        backend: ScriptedBackend,
        answers: &[&str],
    ) -> ProcessController<ScriptedBackend, ScriptedPrompt> {
        ProcessController::new(backend, ScriptedPrompt::new(answers), ControlConfig::default())
    }

    fn record(name: &str, path: &std::path::Path) -> AppRecord {
        AppRecord::new(
            name,
            format!("{name}.exe"),
            path.to_string_lossy(),
            100,
            AppSource::Disk,
        )
    }

    #[test]
    fn find_windows_matches_owner_substring_and_skips_unreadable() {
        let mut backend = ScriptedBackend::default();
        backend.add(FakeProcess::new(10, "notepad").with_window(1));
        backend.add(FakeProcess::new(11, "notepad++").with_window(2));
        backend.add(FakeProcess::new(12, "calc").with_window(3));
        backend.add(FakeProcess::new(13, "notepad").with_window(4).name_denied());

        let mut controller = controller(backend, &[]);
        assert_eq!(
            controller.find_windows("Notepad.exe"),
            vec![WindowHandle(1), WindowHandle(2)]
        );
        assert!(controller.find_windows("paint").is_empty());
    }

    #[test]
    fn is_running_requires_exact_name() {
        let mut backend = ScriptedBackend::default();
        backend.add(FakeProcess::new(10, "notepad"));

        let mut controller = controller(backend, &[]);
        assert!(controller.is_running("notepad"));
        assert!(controller.is_running("NOTEPAD.EXE"));
        assert!(!controller.is_running("note"));
    }

    #[test]
    fn window_action_touches_every_match() {
        let mut backend = ScriptedBackend::default();
        backend.add(FakeProcess::new(10, "vlc").with_window(1).with_window(2));

        let mut controller = controller(backend, &[]);
        assert_eq!(controller.window_action("vlc", WindowAction::Minimize), Ok(2));
        assert_eq!(
            controller.backend().log,
            vec!["minimize 1".to_string(), "minimize 2".to_string()]
        );
        assert!(matches!(
            controller.window_action("paint", WindowAction::Restore),
            Err(ControlError::NotFound(_))
        ));
    }

    #[test]
    fn empty_name_touches_no_window() {
        let mut backend = ScriptedBackend::default();
        backend.add(FakeProcess::new(10, "vlc").with_window(1));
        backend.add(FakeProcess::new(11, "calc").with_window(2));

        let mut controller = controller(backend, &[]);
        assert!(controller.find_windows(".exe").is_empty());
        for name in ["", ".exe", "  "] {
            assert!(matches!(
                controller.window_action(name, WindowAction::Minimize),
                Err(ControlError::NotFound(_))
            ));
        }
        assert!(controller.backend().log.is_empty());
    }

    #[test]
    fn open_app_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(ScriptedBackend::default(), &[]);
        let result = controller.open_app(&record("gone", &dir.path().join("gone.exe")));
        assert!(matches!(result, Err(ControlError::NotFound(_))));
        assert!(controller.backend().log.is_empty());
    }

    #[test]
    fn open_app_confirms_second_instance() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("tool.exe");
        std::fs::write(&exe, b"MZ").unwrap();

        let mut backend = ScriptedBackend::default();
        backend.add(FakeProcess::new(10, "tool"));

        let mut refused = controller(backend.clone(), &["no"]);
        assert_eq!(
            refused.open_app(&record("tool", &exe)),
            Err(ControlError::UserCancelled)
        );
        assert!(refused.backend().log.is_empty());

        let mut accepted = controller(backend, &["y"]);
        assert_eq!(accepted.open_app(&record("tool", &exe)), Ok(()));
        assert_eq!(accepted.backend().log.len(), 1);
        assert!(accepted.backend().log[0].starts_with("launch"));
    }

    #[test]
    fn pick_single_result_needs_no_input() {
        let app = AppRecord::new("vlc", "vlc.exe", r"C:\vlc.exe", 100, AppSource::Disk);
        let mut controller = controller(ScriptedBackend::default(), &[]);
        assert_eq!(controller.pick(&[app.clone()]), Some(app));
        assert_eq!(controller.pick(&[]), None);
    }

    #[test]
    fn pick_among_many() {
        let apps = vec![
            AppRecord::new("chrome", "chrome.exe", r"C:\a\chrome.exe", 100, AppSource::Disk),
            AppRecord::new("chromium", "chromium.exe", r"C:\b\chromium.exe", 100, AppSource::Disk),
        ];
        let mut backend = ScriptedBackend::default();
        backend.add(FakeProcess::new(10, "chrome"));

        let mut chosen = controller(backend.clone(), &["2"]);
        assert_eq!(chosen.pick(&apps), Some(apps[1].clone()));
        assert!(chosen.prompt().said.iter().any(|line| line.contains("chrome [RUNNING]")));
        assert!(chosen.prompt().said.iter().any(|line| line.contains("chromium (")));
        assert_eq!(chosen.backend().listings, 1);

        for answer in ["", "0", "3", "abc"] {
            let mut cancelled = controller(backend.clone(), &[answer]);
            assert_eq!(cancelled.pick(&apps), None, "answer {:?}", answer);
        }
    }
}
