//! devforge - Main entry point
//!
//! Terminal installer for developer tools, fonts, MCP server bindings and
//! boot diagnostics on a Linux workstation.

mod app;
mod atomic_file;
mod cli;
mod detect;
mod diagnostics;
mod error;
mod executor;
mod preferences;
mod privilege;
mod process_guard;
mod registry;
mod script_runner;
mod secrets;
mod status_cache;
mod theme;
mod ui;

use anyhow::Context;
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::{debug, error, info};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::stdout;
use std::path::PathBuf;

use crate::app::App;
use crate::cli::Cli;

/// Initialize the logger with appropriate settings
fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;

    Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}:{}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env() // RUST_LOG overrides
        .init();
}

/// Locate the repository root holding the scripts/ tree.
///
/// Walks up from the executable location, then from the working directory;
/// DEVFORGE_ROOT overrides everything.
fn find_repo_root() -> PathBuf {
    if let Ok(root) = std::env::var("DEVFORGE_ROOT") {
        return PathBuf::from(root);
    }

    let mut candidates = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        candidates.push(exe);
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }

    for start in candidates {
        let mut dir = start.as_path();
        for _ in 0..10 {
            if dir.join("scripts").is_dir() {
                return dir.to_path_buf();
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }

    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn run_tui(cli: &Cli) -> anyhow::Result<()> {
    let repo_root = find_repo_root();
    info!("repo root: {}", repo_root.display());

    enable_raw_mode().context("failed to enable raw mode")?;
    execute!(stdout(), EnterAlternateScreen).context("failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
    terminal.clear()?;

    let mut app = App::new(repo_root, cli.demo_child, cli.demo_child && cli.sudo_cached);
    let result = app.run(&mut terminal);

    // Always restore the terminal, even when the loop errored.
    let _ = disable_raw_mode();
    let _ = execute!(stdout(), LeaveAlternateScreen);

    result
}

fn main() {
    init_logger();
    info!("devforge starting up");

    // Ensure bash children die with us, whatever the exit path.
    if let Err(e) = process_guard::init_signal_handlers() {
        log::warn!("failed to initialize signal handlers: {}", e);
    }
    debug!("signal handlers initialized");

    let cli = Cli::parse_args();

    if let Err(e) = run_tui(&cli) {
        error!("fatal: {:#}", e);
        eprintln!("devforge: {:#}", e);
        std::process::exit(1);
    }
}
