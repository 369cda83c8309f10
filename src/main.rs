//! app-indexer - Desktop application index and process control
//!
//! Builds a cached index of installed executables from the uninstall
//! registry, start-menu shortcuts, a drive scan and the built-in OS tools,
//! then finds, launches, closes and arranges those apps from a console.

mod cache;
mod commands;
mod config;
mod control;
mod indexer;
mod model;
mod platform;
mod search;

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::commands::{Command, Flow, Session};
use crate::config::Config;
use crate::control::{ConsolePrompt, ProcessController, SystemBackend, WindowAction};
use crate::indexer::{spawn_auto_update, Indexer, SharedIndex};

/// app-indexer - Find, launch and close desktop apps
#[derive(Parser)]
#[command(name = "app-indexer")]
#[command(version)]
#[command(about = "Index installed desktop apps and control their processes", long_about = None)]
struct Cli {
    /// Defaults to the interactive console
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console with background auto-update
    Console,

    /// Search the app index
    Search { query: String },

    /// Launch an app
    Open { name: String },

    /// Close every running process matching the name
    Close { name: String },

    /// Minimize matching windows
    Minimize { name: String },

    /// Maximize matching windows
    Maximize { name: String },

    /// Restore matching windows
    Restore { name: String },

    /// Check whether an app is running
    Running { name: String },

    /// Rebuild the index now
    Reindex,

    /// Inspect or clean the cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache file, age and size
    Status,
    /// Drop entries whose executable is gone
    Clean,
}

impl Commands {
    /// One-shot console command, if this subcommand maps to one
    fn into_command(self) -> Option<Command> {
        let command = match self {
            Commands::Console | Commands::Config => return None,
            Commands::Search { query } => Command::Search(query),
            Commands::Open { name } => Command::Open(name),
            Commands::Close { name } => Command::Close(name),
            Commands::Minimize { name } => Command::Window(name, WindowAction::Minimize),
            Commands::Maximize { name } => Command::Window(name, WindowAction::Maximize),
            Commands::Restore { name } => Command::Window(name, WindowAction::Restore),
            Commands::Running { name } => Command::Running(name),
            Commands::Reindex => Command::Reindex { background: false },
            Commands::Cache { action: CacheAction::Status } => Command::CacheStatus,
            Commands::Cache { action: CacheAction::Clean } => Command::CacheClean,
        };
        Some(command)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.service.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    if matches!(cli.command, Some(Commands::Config)) {
        show_config(&config)?;
        return Ok(());
    }

    let one_shot = cli.command.and_then(Commands::into_command);
    let interactive = one_shot.is_none();

    let runtime = Runtime::new().context("Failed to start async runtime")?;
    let indexer = Indexer::new(config.clone());

    if interactive {
        println!("Initializing app index...");
    }
    // one-shot reindex builds below, no point loading first
    let skip_initial = matches!(one_shot, Some(Command::Reindex { .. }));
    let apps = if skip_initial {
        Vec::new()
    } else {
        runtime.block_on(indexer.build(false, !interactive))?
    };
    let index = SharedIndex::new(apps);

    let controller = ProcessController::new(SystemBackend::new(), ConsolePrompt, config.control.clone());
    let mut session = Session::new(runtime.handle().clone(), indexer.clone(), index.clone(), controller);

    match one_shot {
        Some(command) => {
            session.execute(command);
        }
        None => {
            {
                let _guard = runtime.enter();
                spawn_auto_update(&indexer, &index);
            }
            info!("Auto-update every {:?}", config.check_interval());
            run_console(&mut session)?;
        }
    }

    indexer.request_stop();
    runtime.shutdown_background();
    Ok(())
}

/// Read commands from stdin until `exit` or end of input
fn run_console(session: &mut Session<SystemBackend, ConsolePrompt>) -> Result<()> {
    println!("Ready. Type 'help' for commands.\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush stdout")?;

        line.clear();
        if stdin.lock().read_line(&mut line).context("Failed to read stdin")? == 0 {
            println!();
            break;
        }

        match Command::parse(&line) {
            Ok(Some(command)) => {
                if session.execute(command) == Flow::Exit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => println!("{}", e),
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("app-indexer Configuration");
    println!("=========================");
    println!("Config file:         {}", config.config_path.display());
    println!("Cache directory:     {}", config.cache_dir.display());
    println!();
    print!("{}", toml::to_string_pretty(config).context("Failed to serialize config")?);
    Ok(())
}
