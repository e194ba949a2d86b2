//! Configuration management for devterm.
//!
//! Loaded from `~/.devterm/config.toml`. Every field is optional:
//!
//! ```toml
//! # Shell flavor: bash, cmd, pseudo-terminal
//! shell = "bash"
//!
//! # Override the flavor's executable and flags (optional)
//! shell_program = "/usr/bin/zsh"
//! shell_args = ["-i"]
//!
//! # Preferred working directory (falls back to the current directory)
//! project_root = "/home/me/project"
//!
//! # Transcript budget in characters
//! max_output_length = 10000
//!
//! [pty]
//! rows = 30
//! cols = 120
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::session::SessionOptions;
use crate::core::shell::{ShellCommand, ShellKind};
use crate::core::transcript::DEFAULT_MAX_OUTPUT_LENGTH;
use crate::history::HISTORY_LIMIT;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell flavor
    pub shell: ShellKind,
    /// Executable override
    pub shell_program: Option<String>,
    /// Argument override
    pub shell_args: Option<Vec<String>>,
    /// Preferred working directory
    pub project_root: Option<PathBuf>,
    /// Transcript budget in characters
    pub max_output_length: usize,
    /// Host tick interval
    pub poll_interval_ms: u64,
    /// How long to keep draining output after the process exits
    pub exit_drain_ms: u64,
    /// Drop escape sequences and control characters from output
    pub strip_escape_sequences: bool,
    /// Echo each submitted command into the transcript
    pub echo_commands: bool,
    /// Maximum history entries
    pub history_limit: usize,
    /// Pseudo-terminal settings
    pub pty: PtyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: ShellKind::default(),
            shell_program: None,
            shell_args: None,
            project_root: None,
            max_output_length: DEFAULT_MAX_OUTPUT_LENGTH,
            poll_interval_ms: 10,
            exit_drain_ms: 500,
            strip_escape_sequences: true,
            echo_commands: true,
            history_limit: HISTORY_LIMIT,
            pty: PtyConfig::default(),
        }
    }
}

/// Pseudo-terminal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PtyConfig {
    pub rows: u16,
    pub cols: u16,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self { rows: 30, cols: 120 }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file gives defaults; an unreadable or malformed one is logged
    /// and also gives defaults.
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("Ignoring config file: {:#}", e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Load configuration from `path`
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Get config file path
    pub fn get_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// The shell to launch, with overrides applied
    pub fn shell_command(&self) -> ShellCommand {
        let mut command = ShellCommand::new(self.shell);
        if let Some(ref program) = self.shell_program {
            command = command.with_program(program.clone());
        }
        if let Some(ref args) = self.shell_args {
            command = command.with_args(args.clone());
        }
        command
    }

    /// Host tick interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Session settings derived from this configuration
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            shell: self.shell_command(),
            project_root: self.project_root.clone(),
            max_output_length: self.max_output_length,
            exit_drain: Duration::from_millis(self.exit_drain_ms),
            strip_escape_sequences: self.strip_escape_sequences,
            echo_commands: self.echo_commands,
            history_limit: self.history_limit,
            pty_size: (self.pty.rows, self.pty.cols),
        }
    }
}

/// `~/.devterm`, where config and log files live
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".devterm"))
}
