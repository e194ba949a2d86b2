//! Error types for the terminal core.

use std::fmt;
use thiserror::Error;

/// Which output channel of the shell process a piece of data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSource {
    /// Standard output (piped shells)
    Stdout,
    /// Standard error (piped shells)
    Stderr,
    /// Pseudo-terminal master (stdout and stderr already merged by the pty)
    Pty,
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamSource::Stdout => "stdout",
            StreamSource::Stderr => "stderr",
            StreamSource::Pty => "pty",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum TerminalError {
    /// The shell executable could not be found or spawned
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Input was written after the process exited or the session was closed
    #[error("Input channel closed: the shell process is no longer running")]
    ChannelClosed,

    /// A read on one output channel failed; the other channel keeps running
    #[error("Failed to read {source_stream}: {message}")]
    StreamRead {
        source_stream: StreamSource,
        message: String,
    },

    /// Background tasks need a tokio runtime to live on
    #[error("No async runtime available: {0}")]
    Runtime(String),
}

impl TerminalError {
    pub(crate) fn launch(
        program: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        TerminalError::Launch {
            program: program.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TerminalError>;
