//! devterm - an interactive shell panel
//!
//! Runs one shell in a full-screen panel. Output from stdout and stderr is
//! merged into a bounded transcript; commands are typed into an input line and
//! forwarded to the shell on Enter.
//!
//! # Quick Start
//!
//! ```text
//! devterm                         # Default shell for the platform
//! devterm --shell pseudo-terminal # Shell behind a pseudo-terminal
//! devterm --cwd ~/project         # Start in a project directory
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Submit command |
//! | Up/Down | Command history |
//! | PageUp/PageDown | Scroll transcript |
//! | Ctrl+L | Clear transcript |
//! | F1 | Shell help |
//! | Esc / Ctrl+C | Quit |

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use crossterm::event::{self, Event};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use devterm::config::{config_dir, Config};
use devterm::core::{SessionState, ShellKind, TerminalSession};
use devterm::history::HistoryDirection;
use devterm::ui::renderer::max_scroll;
use devterm::ui::{KeyMapper, PanelAction, PanelView, Renderer};

#[derive(Parser, Debug)]
#[command(name = "devterm", version, about = "Interactive shell panel with a bounded transcript")]
struct Args {
    /// Shell flavor: bash, cmd or pseudo-terminal
    #[arg(short, long, value_parser = parse_shell)]
    shell: Option<ShellKind>,

    /// Shell executable (overrides the flavor's default)
    #[arg(short, long)]
    program: Option<String>,

    /// Working directory for the shell
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Transcript budget in characters
    #[arg(long)]
    max_output: Option<usize>,

    /// Config file (default: ~/.devterm/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the resolved configuration to the config file and exit
    #[arg(long)]
    init_config: bool,
}

fn parse_shell(name: &str) -> Result<ShellKind, String> {
    ShellKind::parse(name)
        .ok_or_else(|| format!("unknown shell '{}' (expected bash, cmd or pseudo-terminal)", name))
}

impl Args {
    /// Load the config file and apply command line overrides
    fn resolve_config(&self) -> anyhow::Result<Config> {
        let config = match self.config {
            Some(ref path) => Config::load_from(path)?,
            None => Config::load(),
        };
        Ok(self.apply_overrides(config))
    }

    fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(shell) = self.shell {
            // A different flavor does not inherit the file's program override
            if shell != config.shell {
                config.shell_program = None;
                config.shell_args = None;
            }
            config.shell = shell;
        }
        if let Some(ref program) = self.program {
            config.shell_program = Some(program.clone());
        }
        if let Some(ref cwd) = self.cwd {
            config.project_root = Some(cwd.clone());
        }
        if let Some(max_output) = self.max_output {
            config.max_output_length = max_output;
        }
        config
    }
}

/// Log to ~/.devterm/devterm.log since the terminal itself is the UI
fn init_logging() {
    let log_path = config_dir()
        .map(|dir| dir.join("devterm.log"))
        .unwrap_or_else(|| PathBuf::from("devterm.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter =
            EnvFilter::try_from_env("DEVTERM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    info!("devterm {} starting...", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        let path = args
            .config
            .clone()
            .or_else(Config::get_config_path)
            .context("No home directory for the config file")?;
        // Defaults plus command line overrides; an existing file is replaced
        let config = args.apply_overrides(Config::default());
        config.save_to(&path)?;
        info!("Wrote config to {}", path.display());
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config = args.resolve_config()?;

    // Stream reads and process waits run here; the panel loop stays synchronous
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("devterm-io")
        .build()
        .context("Failed to build async runtime")?;
    let _guard = runtime.enter();

    let mut session = TerminalSession::open(config.session_options());

    let mut renderer = Renderer::new();
    renderer.init()?;

    let result = run_main_loop(&mut session, &mut renderer, &config);

    // Restore the terminal before waiting on the shell
    let _ = renderer.cleanup();
    runtime.block_on(session.shutdown());

    if let Err(ref e) = result {
        error!("Panel loop failed: {:#}", e);
    }
    info!("devterm exiting");
    result
}

fn status_line(session: &TerminalSession, scroll: usize) -> String {
    let state = match session.state() {
        SessionState::Ready => "ready".to_string(),
        SessionState::Dispatching => "busy".to_string(),
        SessionState::Terminated => match session.exit_code() {
            Some(code) => format!("exited ({})", code),
            None => "exited".to_string(),
        },
    };
    let process = session.process();
    let mut line = format!(
        " {} | {} | {}",
        process.command().display_name(),
        process.working_directory().display(),
        state
    );
    if scroll > 0 {
        line.push_str(&format!(" | scrolled {}", scroll));
    }
    line
}

/// Half a screen, used for PageUp/PageDown
fn page_step() -> anyhow::Result<usize> {
    let (_, rows) = Renderer::size()?;
    Ok((rows as usize / 2).max(1))
}

/// Main event loop
fn run_main_loop(
    session: &mut TerminalSession,
    renderer: &mut Renderer,
    config: &Config,
) -> anyhow::Result<()> {
    let poll_timeout = config.poll_interval();
    let mut scroll: usize = 0;
    let mut dirty = true;

    loop {
        if session.tick().changed() {
            dirty = true;
        }

        if dirty {
            let (_, rows) = Renderer::size()?;
            let body_rows = (rows as usize).saturating_sub(2);
            scroll = scroll.min(max_scroll(session.transcript(), body_rows));

            let status = status_line(session, scroll);
            renderer.render(&PanelView {
                transcript: session.transcript(),
                input: session.input(),
                status: &status,
                scroll,
                input_disabled: !session.accepts_input(),
            })?;
            dirty = false;
        }

        if !event::poll(poll_timeout)? {
            continue;
        }

        match event::read()? {
            Event::Key(key_event) => {
                let Some(action) = KeyMapper::map(&key_event) else {
                    continue;
                };
                // Once the shell is gone only quit, scroll and clear remain
                if action.needs_input() && !session.accepts_input() {
                    continue;
                }
                dirty = true;

                match action {
                    PanelAction::Quit => {
                        // Disposal happens in shutdown() after the loop
                        info!("Quit requested");
                        return Ok(());
                    }
                    PanelAction::Insert(ch) => session.push_input(ch),
                    PanelAction::Backspace => session.pop_input(),
                    PanelAction::Submit => {
                        scroll = 0;
                        // Delivery failures are already in the transcript
                        let _ = session.submit();
                    }
                    PanelAction::Help => {
                        scroll = 0;
                        let _ = session.help();
                    }
                    PanelAction::HistoryOlder => session.navigate_history(HistoryDirection::Older),
                    PanelAction::HistoryNewer => session.navigate_history(HistoryDirection::Newer),
                    PanelAction::ScrollUp => scroll = scroll.saturating_add(page_step()?),
                    PanelAction::ScrollDown => scroll = scroll.saturating_sub(page_step()?),
                    PanelAction::Clear => {
                        scroll = 0;
                        session.clear();
                    }
                }
            }
            Event::Resize(cols, rows) => {
                info!("Resize: {}x{}", cols, rows);
                dirty = true;
            }
            _ => {}
        }
    }
}
