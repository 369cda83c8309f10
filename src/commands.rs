//! Console commands and their dispatch

use thiserror::Error;
use tokio::runtime::Handle;
use tracing::error;

use crate::control::{ControlError, ProcessBackend, ProcessController, Prompt, WindowAction};
use crate::indexer::{background_rebuild, Indexer, SharedIndex};
use crate::model::{strip_exe, AppRecord};
use crate::search::search;

pub const HELP: &str = "\
Commands:
  search <name>         find indexed apps
  open <name>           launch an app (asks when several match)
  close <name>          close every running process matching the name
  minimize <name>       minimize matching windows
  maximize <name>       maximize matching windows
  restore <name>        restore matching windows
  running <name>        check whether an app is running
  reindex [bg]          rebuild the index now, or in the background
  cache status          show cache file, age and size
  cache clean           drop entries whose executable is gone
  help                  show this list
  exit                  quit";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown command: '{0}'. Type 'help'.")]
    Unknown(String),
}

/// One console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    Open(String),
    Close(String),
    Window(String, WindowAction),
    Running(String),
    Reindex { background: bool },
    CacheStatus,
    CacheClean,
    Help,
    Exit,
}

impl Command {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, arg) = match line.split_once(char::is_whitespace) {
            Some((word, arg)) => (word, arg.trim()),
            None => (line, ""),
        };
        let required = |usage: &'static str| {
            if arg.is_empty() {
                Err(CommandError::Usage(usage))
            } else {
                Ok(arg.to_string())
            }
        };

        let command = match word.to_lowercase().as_str() {
            "search" => Command::Search(required("search <name>")?),
            "open" => Command::Open(required("open <name>")?),
            "close" => Command::Close(required("close <name>")?),
            "minimize" => Command::Window(required("minimize <name>")?, WindowAction::Minimize),
            "maximize" => Command::Window(required("maximize <name>")?, WindowAction::Maximize),
            "restore" => Command::Window(required("restore <name>")?, WindowAction::Restore),
            "running" => Command::Running(required("running <name>")?),
            "reindex" => match arg {
                "" => Command::Reindex { background: false },
                "bg" => Command::Reindex { background: true },
                _ => return Err(CommandError::Usage("reindex [bg]")),
            },
            "cache" => match arg {
                "status" => Command::CacheStatus,
                "clean" => Command::CacheClean,
                _ => return Err(CommandError::Usage("cache status | cache clean")),
            },
            "help" => Command::Help,
            "exit" | "quit" => Command::Exit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        match command.missing_target() {
            Some(usage) => Err(CommandError::Usage(usage)),
            None => Ok(Some(command)),
        }
    }

    /// Usage text when the command's name argument is empty once normalized.
    ///
    /// `close .exe` would otherwise match every process.
    pub fn missing_target(&self) -> Option<&'static str> {
        let (target, usage, normalize) = match self {
            Command::Search(query) => (query, "search <name>", false),
            Command::Open(query) => (query, "open <name>", false),
            Command::Close(name) => (name, "close <name>", true),
            Command::Window(name, WindowAction::Minimize) => (name, "minimize <name>", true),
            Command::Window(name, WindowAction::Maximize) => (name, "maximize <name>", true),
            Command::Window(name, WindowAction::Restore) => (name, "restore <name>", true),
            Command::Running(name) => (name, "running <name>", true),
            _ => return None,
        };

        let empty = if normalize {
            strip_exe(target).is_empty()
        } else {
            target.trim().is_empty()
        };
        empty.then_some(usage)
    }
}

/// Whether the console keeps reading after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Everything a command can touch
pub struct Session<B: ProcessBackend, P: Prompt> {
    runtime: Handle,
    indexer: Indexer,
    index: SharedIndex,
    controller: ProcessController<B, P>,
}

impl<B: ProcessBackend, P: Prompt> Session<B, P> {
    pub fn new(
        runtime: Handle,
        indexer: Indexer,
        index: SharedIndex,
        controller: ProcessController<B, P>,
    ) -> Self {
        Self {
            runtime,
            indexer,
            index,
            controller,
        }
    }

    fn say(&mut self, line: &str) {
        self.controller.prompt().say(line);
    }

    pub fn execute(&mut self, command: Command) -> Flow {
        if let Some(usage) = command.missing_target() {
            self.say(&CommandError::Usage(usage).to_string());
            return Flow::Continue;
        }

        match command {
            Command::Search(query) => self.search(&query),
            Command::Open(query) => self.open(&query),
            Command::Close(name) => {
                let outcome = self.controller.close_by_name(&name);
                self.say(&outcome.to_string());
            }
            Command::Window(name, action) => self.window(&name, action),
            Command::Running(name) => {
                let state = if self.controller.is_running(&name) {
                    "RUNNING"
                } else {
                    "NOT running"
                };
                self.say(&format!("'{}' is {}", name, state));
            }
            Command::Reindex { background: true } => {
                {
                    let _guard = self.runtime.enter();
                    background_rebuild(&self.indexer, &self.index);
                }
                self.say("Reindexing in background...");
            }
            Command::Reindex { background: false } => self.reindex(),
            Command::CacheStatus => {
                let status = self
                    .indexer
                    .store()
                    .status(&self.index.snapshot(), self.indexer.is_building());
                self.say(&status.to_string());
            }
            Command::CacheClean => self.clean(),
            Command::Help => self.say(HELP),
            Command::Exit => {
                self.say("Goodbye!");
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    fn lookup(&mut self, query: &str) -> Vec<AppRecord> {
        let results = search(query, &self.index.snapshot());
        if results.is_empty() {
            self.say(&format!("'{}' not found. Try 'reindex'.", query));
        }
        results
    }

    fn search(&mut self, query: &str) {
        let results = self.lookup(query);
        if results.is_empty() {
            return;
        }

        let running = self.controller.running_names();
        for app in results {
            let status = if running.contains(&strip_exe(&app.exe)) {
                " [RUNNING]"
            } else {
                ""
            };
            self.say(&format!("  - {}{}  ({} KB)", app.name, status, app.size_kb));
            self.say(&format!("    {}", app.path));
        }
    }

    fn open(&mut self, query: &str) {
        let results = self.lookup(query);
        let Some(app) = self.controller.pick(&results) else {
            return;
        };

        match self.controller.open_app(&app) {
            Ok(()) => self.say(&format!(
                "Launched: {} ({} KB) -> {}",
                app.name, app.size_kb, app.path
            )),
            Err(ControlError::UserCancelled) => self.say("Cancelled"),
            Err(e) => self.say(&format!("Failed to open '{}': {}", app.name, e)),
        }
    }

    fn window(&mut self, name: &str, action: WindowAction) {
        match self.controller.window_action(name, action) {
            Ok(count) => self.say(&format!(
                "{} '{}' ({} window{})",
                action.past_tense(),
                name,
                count,
                if count == 1 { "" } else { "s" }
            )),
            Err(ControlError::NotFound(_)) => self.say(&format!("No window found for '{}'", name)),
            Err(e) => self.say(&format!("Failed to {} '{}': {}", action, name, e)),
        }
    }

    fn reindex(&mut self) {
        if let Err(e) = self.runtime.block_on(self.indexer.rebuild_into(&self.index, false)) {
            error!("Reindex failed: {:#}", e);
            self.say(&format!("Reindex failed: {:#}", e));
        }
    }

    fn clean(&mut self) {
        match self.runtime.block_on(self.indexer.clean(&self.index)) {
            Ok((removed, remaining)) => {
                self.say(&format!(
                    "Cleaned: removed {} dead entries, {} apps remain",
                    removed, remaining
                ));
            }
            Err(e) => self.say(&format!("Cache clean failed: {:#}", e)),
        }
    }
}
