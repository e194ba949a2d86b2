//! Shell flavors and launch policy
//!
//! Each flavor knows how to build its launch arguments, what to call itself in the
//! status line, and which line terminator its input expects.

use serde::{Deserialize, Serialize};

/// Supported shell flavors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShellKind {
    /// POSIX-style shell over redirected pipes
    Bash,
    /// Windows command interpreter over redirected pipes
    Cmd,
    /// Any shell attached to a pseudo terminal (single merged output channel)
    PseudoTerminal,
}

impl Default for ShellKind {
    fn default() -> Self {
        if cfg!(windows) {
            ShellKind::Cmd
        } else {
            ShellKind::Bash
        }
    }
}

impl ShellKind {
    /// Short name shown in the banner and status line
    pub fn display_name(&self) -> &'static str {
        match self {
            ShellKind::Bash => "bash",
            ShellKind::Cmd => "cmd",
            ShellKind::PseudoTerminal => "pty",
        }
    }

    /// Whether the output may carry VT100 escape sequences
    pub fn supports_vt100(&self) -> bool {
        matches!(self, ShellKind::PseudoTerminal)
    }

    /// Whether stdin/stdout/stderr are redirected pipes (as opposed to a pty)
    pub fn is_piped(&self) -> bool {
        !matches!(self, ShellKind::PseudoTerminal)
    }

    /// Executable used when none is configured
    pub fn default_program(&self) -> String {
        match self {
            ShellKind::Bash => "/bin/bash".to_string(),
            ShellKind::Cmd => "cmd.exe".to_string(),
            ShellKind::PseudoTerminal => {
                if cfg!(windows) {
                    "cmd.exe".to_string()
                } else {
                    std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
                }
            }
        }
    }

    /// Arguments used when none are configured
    pub fn default_args(&self) -> Vec<String> {
        match self {
            // Interactive even though stdin is not a tty
            ShellKind::Bash => vec!["-i".to_string()],
            // Suppress command echo; cmd stays interactive on a piped stdin
            ShellKind::Cmd => vec!["/Q".to_string()],
            ShellKind::PseudoTerminal => {
                if cfg!(windows) {
                    Vec::new()
                } else {
                    vec!["-i".to_string()]
                }
            }
        }
    }

    /// Terminator appended to every submitted command
    pub fn line_terminator(&self) -> &'static str {
        match self {
            ShellKind::Bash => "\n",
            ShellKind::Cmd => "\r\n",
            ShellKind::PseudoTerminal => "\r",
        }
    }

    /// Parse a flavor name as accepted on the command line and in config
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "bash" | "sh" | "posix" => Some(ShellKind::Bash),
            "cmd" | "cmd.exe" => Some(ShellKind::Cmd),
            "pty" | "pseudo-terminal" | "pseudoterminal" | "conpty" => {
                Some(ShellKind::PseudoTerminal)
            }
            _ => None,
        }
    }
}

/// A fully resolved shell launch: flavor, executable and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub kind: ShellKind,
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    /// Launch `kind` with its default program and arguments
    pub fn new(kind: ShellKind) -> Self {
        Self {
            kind,
            program: kind.default_program(),
            args: kind.default_args(),
        }
    }

    /// Replace the executable, keeping the flavor's arguments
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Replace the argument list
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn display_name(&self) -> &'static str {
        self.kind.display_name()
    }
}

impl Default for ShellCommand {
    fn default() -> Self {
        Self::new(ShellKind::default())
    }
}
