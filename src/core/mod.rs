//! Core terminal components.
//!
//! - **shell**: shell flavors and their launch policy
//! - **process**: shell process adapter (spawn, input, exit, disposal)
//! - **pty**: pseudo-terminal backend for the `PseudoTerminal` flavor
//! - **multiplexer**: merges stdout and stderr into one ordered stream
//! - **text**: incremental UTF-8 decoding and escape stripping
//! - **transcript**: bounded, line-aware output buffer
//! - **session**: per-tick driver tying it all together
//!
//! # Architecture
//!
//! ```text
//! TerminalSession
//! ├── ShellProcess (owns the child, input channel, cancel signal)
//! │   └── multiplexer task(s) ──> MergedOutput
//! ├── Transcript (bounded text)
//! └── CommandHistory
//! ```

pub mod error;
pub mod multiplexer;
pub mod process;
pub mod pty;
pub mod session;
pub mod shell;
pub mod text;
pub mod transcript;

#[cfg(test)]
mod proptest;

pub use error::{Result, StreamSource, TerminalError};
pub use session::{SessionOptions, SessionState, TerminalSession, TickOutcome};
pub use shell::{ShellCommand, ShellKind};
pub use transcript::Transcript;
