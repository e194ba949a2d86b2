//! Session management
//!
//! Binds one shell process to a bounded transcript and a command history.
//! The host calls [`TerminalSession::tick`] from its own frame or timer callback;
//! each tick drains everything the multiplexer has published so far and never
//! waits for more.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::error::{Result, StreamSource, TerminalError};
use super::multiplexer::{self, MergedOutput, OutputEvent};
use super::process::{resolve_working_directory, ShellProcess};
use super::shell::ShellCommand;
use super::text::OutputDecoder;
use super::transcript::{Transcript, DEFAULT_MAX_OUTPUT_LENGTH};
use crate::history::{CommandHistory, HistoryDirection, Recall, HISTORY_LIMIT};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Process running, nothing outstanding
    Ready,
    /// A command is being forwarded to the process
    Dispatching,
    /// Process gone or session closed; final
    Terminated,
}

/// Settings for a new session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub shell: ShellCommand,
    /// Preferred working directory
    pub project_root: Option<PathBuf>,
    /// Transcript budget in characters
    pub max_output_length: usize,
    /// How long to keep draining after the process exits
    pub exit_drain: Duration,
    pub strip_escape_sequences: bool,
    pub echo_commands: bool,
    pub history_limit: usize,
    /// Rows and columns for the pseudo-terminal flavor
    pub pty_size: (u16, u16),
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            shell: ShellCommand::default(),
            project_root: None,
            max_output_length: DEFAULT_MAX_OUTPUT_LENGTH,
            exit_drain: Duration::from_millis(500),
            strip_escape_sequences: true,
            echo_commands: true,
            history_limit: HISTORY_LIMIT,
            pty_size: (30, 120),
        }
    }
}

/// What a tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// New text reached the transcript
    pub output: bool,
    /// The session transitioned to Terminated during this tick
    pub terminated: bool,
}

impl TickOutcome {
    /// Whether the host should re-render
    pub fn changed(&self) -> bool {
        self.output || self.terminated
    }
}

/// One interactive shell session
pub struct TerminalSession {
    process: ShellProcess,
    output: MergedOutput,
    transcript: Transcript,
    history: CommandHistory,
    /// Current contents of the input field
    input: String,
    state: SessionState,
    /// Decoder for stdout (or the merged pty channel)
    stdout_text: OutputDecoder,
    stderr_text: OutputDecoder,
    echo_commands: bool,
    exit_drain: Duration,
    /// When the process exit was first observed
    exit_seen: Option<Instant>,
}

impl TerminalSession {
    /// Launch a shell and create its session.
    ///
    /// Never fails: a launch error is written into the transcript and the session
    /// starts out Terminated.
    pub fn open(options: SessionOptions) -> Self {
        let working_directory = resolve_working_directory(options.project_root.as_deref());
        let (rows, cols) = options.pty_size;
        let process = ShellProcess::new(options.shell.clone(), working_directory)
            .with_pty_size(rows, cols);
        let (sink, output) = multiplexer::merged_channel();
        // The panel never interprets VT100, so pty output is always stripped
        let strip_escapes =
            options.strip_escape_sequences || options.shell.kind.supports_vt100();

        let mut session = Self {
            process,
            output,
            transcript: Transcript::new(options.max_output_length),
            history: CommandHistory::with_limit(options.history_limit),
            input: String::new(),
            state: SessionState::Ready,
            stdout_text: OutputDecoder::new(strip_escapes),
            stderr_text: OutputDecoder::new(strip_escapes),
            echo_commands: options.echo_commands,
            exit_drain: options.exit_drain,
            exit_seen: None,
        };

        match session.process.start(sink) {
            Ok(()) => {
                let shell = session.process.command().display_name();
                let cwd = session.process.working_directory().display().to_string();
                session.transcript.append_line("Console Terminal ready.");
                session.transcript.append_line(&format!("Shell: {}", shell));
                session.transcript.append_line(&format!("Working directory: {}", cwd));
                session
                    .transcript
                    .append_line("Type any console command and press Enter.");
            }
            Err(e) => {
                error!("Failed to start shell: {}", e);
                session.transcript.append_line(&format!("Error: {}", e));
                session.state = SessionState::Terminated;
                session.process.close();
            }
        }

        session
    }

    /// Drain all available output into the transcript and check for process exit
    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.state == SessionState::Terminated {
            return outcome;
        }

        let drained = self.output.drain();
        for event in drained.events {
            outcome.output |= self.apply(event);
        }

        if self.process.has_terminated() {
            let seen = *self.exit_seen.get_or_insert_with(Instant::now);
            if drained.closed || seen.elapsed() >= self.exit_drain {
                outcome.output |= self.flush_decoders();
                let summary = match self.process.exit_code() {
                    Some(code) => format!("(exit code {})", code),
                    None => "(exit code unknown)".to_string(),
                };
                info!("Session terminated {}", summary);
                self.transcript.append_line(&summary);
                self.terminate();
                outcome.terminated = true;
            }
        }

        outcome
    }

    /// Decode one multiplexer event and append it as a single transcript chunk
    fn apply(&mut self, event: OutputEvent) -> bool {
        let text = match event {
            OutputEvent::Data { source, bytes } => self.decoder(source).decode(&bytes),
            OutputEvent::Fault { source, message } => {
                let fault = TerminalError::StreamRead {
                    source_stream: source,
                    message,
                };
                format!("[{}]\n", fault)
            }
        };
        self.append_output(&text)
    }

    fn decoder(&mut self, source: StreamSource) -> &mut OutputDecoder {
        match source {
            StreamSource::Stdout | StreamSource::Pty => &mut self.stdout_text,
            StreamSource::Stderr => &mut self.stderr_text,
        }
    }

    /// Emit bytes still held back by the decoders
    fn flush_decoders(&mut self) -> bool {
        let mut tail = self.stdout_text.finish();
        tail.push_str(&self.stderr_text.finish());
        self.append_output(&tail)
    }

    fn append_output(&mut self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        self.transcript.append(text);
        true
    }

    /// Submit the current input field
    pub fn submit(&mut self) -> Result<bool> {
        let input = std::mem::take(&mut self.input);
        self.submit_command(&input)
    }

    /// Forward a command to the shell.
    ///
    /// Blank input is ignored (`Ok(false)`). On success the command is added to the
    /// history and the input field is cleared. Writing to an exited shell fails with
    /// [`TerminalError::ChannelClosed`] and terminates the session.
    pub fn submit_command(&mut self, text: &str) -> Result<bool> {
        let command = text.trim();
        if command.is_empty() {
            self.input.clear();
            return Ok(false);
        }
        if self.state == SessionState::Terminated {
            return Err(TerminalError::ChannelClosed);
        }

        self.state = SessionState::Dispatching;
        debug!("Dispatching command: {:?}", command);
        if self.echo_commands {
            self.transcript.append_line(&format!("> {}", command));
        }

        if let Err(e) = self.process.write_command(command) {
            warn!("Command not delivered: {}", e);
            self.transcript.append_line(&format!("Error: {}", e));
            self.terminate();
            return Err(e);
        }

        self.history.add(command);
        self.input.clear();
        self.state = SessionState::Ready;
        Ok(true)
    }

    /// Run the shell's `help` command
    pub fn help(&mut self) -> Result<bool> {
        self.submit_command("help")
    }

    /// Step through the history, writing the recalled entry into the input field
    pub fn navigate_history(&mut self, direction: HistoryDirection) {
        match self.history.navigate(direction) {
            Recall::Entry(command) => self.input = command.to_string(),
            Recall::Cleared => self.input.clear(),
            Recall::Empty => {}
        }
    }

    /// Clear the transcript (history is kept)
    pub fn clear(&mut self) {
        self.transcript.clear();
    }

    /// Close the session (window closed). Idempotent.
    pub fn close(&mut self) {
        if self.state != SessionState::Terminated {
            info!("Session closed by host");
        }
        self.terminate();
    }

    /// Close and wait for the shell's background tasks to finish
    pub async fn shutdown(&mut self) {
        self.state = SessionState::Terminated;
        self.process.shutdown().await;
    }

    fn terminate(&mut self) {
        self.state = SessionState::Terminated;
        self.process.close();
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    /// Whether the host should accept keystrokes into the input field
    pub fn accepts_input(&self) -> bool {
        self.state != SessionState::Terminated
    }

    pub fn transcript(&self) -> &str {
        self.transcript.as_str()
    }

    /// Caret position for the host's output view
    pub fn cursor_position(&self) -> usize {
        self.transcript.cursor_position()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the input field (typing in the host)
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn push_input(&mut self, ch: char) {
        self.input.push(ch);
    }

    pub fn pop_input(&mut self) {
        self.input.pop();
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.process.exit_code()
    }

    pub fn process(&self) -> &ShellProcess {
        &self.process
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shell::ShellKind;

    fn missing_shell() -> SessionOptions {
        SessionOptions {
            shell: ShellCommand::new(ShellKind::Bash)
                .with_program("/definitely/not/a/shell")
                .with_args(Vec::<String>::new()),
            ..SessionOptions::default()
        }
    }

    #[tokio::test]
    async fn test_launch_failure_is_shown_and_terminal() {
        let mut session = TerminalSession::open(missing_shell());
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(!session.accepts_input());
        assert!(session.transcript().starts_with("Error: Failed to launch /definitely/not/a/shell"));
        assert!(!session.transcript().contains("ready"));

        // No polling happens once terminated
        assert_eq!(session.tick(), TickOutcome::default());
        assert!(matches!(
            session.submit_command("ls"),
            Err(TerminalError::ChannelClosed)
        ));
        session.close();
        session.close();
    }

    #[tokio::test]
    async fn test_blank_submission_is_a_no_op() {
        let mut session = TerminalSession::open(missing_shell());
        session.set_input("   ");
        assert!(!session.submit().unwrap());
        assert!(session.history().is_empty());
        assert_eq!(session.input(), "");
    }

    #[tokio::test]
    async fn test_stream_fault_is_noted_in_transcript() {
        let mut session = TerminalSession::open(missing_shell());
        session.clear();
        session.apply(OutputEvent::Fault {
            source: StreamSource::Stderr,
            message: "broken pipe".to_string(),
        });
        assert_eq!(session.transcript(), "[Failed to read stderr: broken pipe]\n");
    }

    #[tokio::test]
    async fn test_split_utf8_across_reads_of_one_channel() {
        let mut session = TerminalSession::open(missing_shell());
        session.clear();
        let bytes = "é\n".as_bytes();
        session.apply(OutputEvent::Data {
            source: StreamSource::Stdout,
            bytes: bytes[..1].to_vec(),
        });
        // A stderr read in between does not disturb the pending stdout byte
        session.apply(OutputEvent::Data {
            source: StreamSource::Stderr,
            bytes: b"warn\n".to_vec(),
        });
        session.apply(OutputEvent::Data {
            source: StreamSource::Stdout,
            bytes: bytes[1..].to_vec(),
        });
        assert_eq!(session.transcript(), "warn\né\n");
    }

    #[tokio::test]
    async fn test_escape_sequences_are_stripped() {
        let mut session = TerminalSession::open(missing_shell());
        session.clear();
        session.apply(OutputEvent::Data {
            source: StreamSource::Pty,
            bytes: b"\x1b[1mbold\x1b[0m\r\n".to_vec(),
        });
        assert_eq!(session.transcript(), "bold\n");
    }

    fn stdout(session: &mut TerminalSession, bytes: &[u8]) {
        session.apply(OutputEvent::Data {
            source: StreamSource::Stdout,
            bytes: bytes.to_vec(),
        });
    }

    #[tokio::test]
    async fn test_escape_split_across_reads_is_dropped_whole() {
        let mut session = TerminalSession::open(missing_shell());
        session.clear();
        stdout(&mut session, b"red \x1b[3");
        stdout(&mut session, b"1mtext\x1b");
        stdout(&mut session, b"[0m\n");
        assert_eq!(session.transcript(), "red text\n");

        stdout(&mut session, b"\x1b]0;win");
        stdout(&mut session, b"dow title\x07$ ");
        assert_eq!(session.transcript(), "red text\n$ ");
    }

    #[tokio::test]
    async fn test_pty_output_is_stripped_even_when_disabled() {
        let mut options = missing_shell();
        options.strip_escape_sequences = false;
        let mut session = TerminalSession::open(options.clone());
        session.clear();
        stdout(&mut session, b"\x1b[1mb\x1b[0m\n");
        assert_eq!(session.transcript(), "\x1b[1mb\x1b[0m\n");

        options.shell = ShellCommand::new(ShellKind::PseudoTerminal)
            .with_program("/definitely/not/a/shell")
            .with_args(Vec::<String>::new());
        let mut session = TerminalSession::open(options);
        session.clear();
        session.apply(OutputEvent::Data {
            source: StreamSource::Pty,
            bytes: b"\x1b[1mb\x1b[0m\r\n".to_vec(),
        });
        assert_eq!(session.transcript(), "b\n");
    }
}
