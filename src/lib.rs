//! devterm - an interactive shell panel with a bounded transcript
//!
//! Hosts one long-lived shell process, merges its stdout and stderr into a
//! single bounded transcript, and forwards whole command lines typed by the
//! user. The host drives everything through [`TerminalSession::tick`].

pub mod config;
pub mod core;
pub mod history;
pub mod ui;

pub use crate::config::Config;
pub use crate::core::{
    Result, SessionOptions, SessionState, ShellCommand, ShellKind, TerminalError,
    TerminalSession, TickOutcome, Transcript,
};
pub use crate::history::{CommandHistory, HistoryDirection};
