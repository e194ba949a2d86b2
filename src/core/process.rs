//! Shell process adapter
//!
//! Owns one interactive shell process: launch with redirected streams, a
//! fire-and-forget input channel, termination detection, and idempotent disposal.
//! All waiting happens on background tasks; no method here blocks the caller.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{Result, StreamSource, TerminalError};
use super::multiplexer::{self, OutputSink};
use super::pty::{self, PtyHandle};
use super::shell::ShellCommand;

/// How long `shutdown` waits for background tasks
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Default pty size when none is given
const DEFAULT_PTY_SIZE: (u16, u16) = (30, 120);

/// Where submitted input goes
enum InputChannel {
    /// Drained into the child's stdin by a writer task
    Piped(mpsc::UnboundedSender<Vec<u8>>),
    /// Written straight to the pty master
    Pty(Box<dyn Write + Send>),
}

/// Pick the working directory for a new shell.
///
/// Uses `preferred` if it is an existing directory, otherwise the current
/// process's working directory. Never fails.
pub fn resolve_working_directory(preferred: Option<&Path>) -> PathBuf {
    if let Some(dir) = preferred {
        if dir.is_dir() {
            return dir.to_path_buf();
        }
        warn!(
            "Project root {} is not a directory, using current directory",
            dir.display()
        );
    }

    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// A shell process with redirected standard streams
pub struct ShellProcess {
    command: ShellCommand,
    working_directory: PathBuf,
    /// Rows and columns for the pty flavor
    pty_size: (u16, u16),
    /// Set once started
    input: Option<InputChannel>,
    /// Commands written before start
    pending: Vec<String>,
    /// Exit code once the process is gone (`None` inside = killed by a signal)
    exit: Arc<OnceLock<Option<i32>>>,
    cancel: watch::Sender<bool>,
    /// Multiplexer, writer and exit-watcher tasks
    tasks: Vec<JoinHandle<()>>,
    pty: Option<PtyHandle>,
    pid: Option<u32>,
    runtime: Option<Handle>,
    started: bool,
    closed: bool,
}

impl ShellProcess {
    /// Prepare a process; nothing is spawned until [`ShellProcess::start`]
    pub fn new(command: ShellCommand, working_directory: PathBuf) -> Self {
        let (cancel, _) = multiplexer::cancel_signal();
        Self {
            command,
            working_directory,
            pty_size: DEFAULT_PTY_SIZE,
            input: None,
            pending: Vec::new(),
            exit: Arc::new(OnceLock::new()),
            cancel,
            tasks: Vec::new(),
            pty: None,
            pid: None,
            runtime: None,
            started: false,
            closed: false,
        }
    }

    /// Set the pty size (rows, cols); only used by the pseudo-terminal flavor
    pub fn with_pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.pty_size = (rows.max(1), cols.max(1));
        self
    }

    /// Spawn the shell and start publishing its output into `sink`.
    ///
    /// Must be called from within a tokio runtime. Commands written before this
    /// call are flushed right after the spawn.
    pub fn start(&mut self, sink: OutputSink) -> Result<()> {
        if self.closed {
            return Err(TerminalError::ChannelClosed);
        }
        if self.started {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|e| TerminalError::Runtime(e.to_string()))?;

        info!(
            "Starting {} shell: {} {:?} in {}",
            self.command.display_name(),
            self.command.program,
            self.command.args,
            self.working_directory.display()
        );

        if self.command.kind.is_piped() {
            self.start_piped(sink)?;
        } else {
            self.start_pty(sink)?;
        }

        self.runtime = Some(runtime);
        self.started = true;
        info!("Shell started (pid {:?})", self.pid);

        for line in std::mem::take(&mut self.pending) {
            self.send_line(line)?;
        }

        Ok(())
    }

    fn start_piped(&mut self, sink: OutputSink) -> Result<()> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .current_dir(&self.working_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            // CREATE_NO_WINDOW
            cmd.creation_flags(0x0800_0000);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| TerminalError::launch(self.command.program.clone(), e))?;
        self.pid = child.id();

        let (stdin, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                let _ = child.start_kill();
                return Err(TerminalError::launch(
                    self.command.program.clone(),
                    "standard streams were not redirected",
                ));
            }
        };

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        self.input = Some(InputChannel::Piped(input_tx));

        self.tasks.push(tokio::spawn(pump_input(stdin, input_rx)));
        self.tasks.push(multiplexer::spawn_piped(
            stdout,
            stderr,
            sink,
            self.cancel.subscribe(),
        ));
        self.tasks.push(tokio::spawn(watch_exit(
            child,
            Arc::clone(&self.exit),
            self.cancel.subscribe(),
        )));

        Ok(())
    }

    fn start_pty(&mut self, sink: OutputSink) -> Result<()> {
        let (rows, cols) = self.pty_size;
        let spawned = pty::spawn(&self.command, &self.working_directory, rows, cols)?;
        self.pid = spawned.child.process_id();

        self.input = Some(InputChannel::Pty(spawned.writer));
        self.pty = Some(spawned.handle);

        self.tasks.push(multiplexer::spawn_blocking_reader(
            spawned.reader,
            StreamSource::Pty,
            sink,
            self.cancel.subscribe(),
        ));

        let exit = Arc::clone(&self.exit);
        let child = spawned.child;
        self.tasks.push(tokio::task::spawn_blocking(move || {
            let code = pty::wait_for_exit(child);
            info!("Shell exited with code {:?}", code);
            let _ = exit.set(code);
        }));

        Ok(())
    }

    /// Send `text` plus the flavor's line terminator to the shell.
    ///
    /// Queued if the process has not been started yet. Fails with
    /// [`TerminalError::ChannelClosed`] once the process has exited or been closed.
    pub fn write_command(&mut self, text: &str) -> Result<()> {
        if self.closed || self.has_terminated() {
            return Err(TerminalError::ChannelClosed);
        }

        let line = format!("{}{}", text, self.command.kind.line_terminator());
        if !self.started {
            debug!("Queueing command until start: {:?}", text);
            self.pending.push(line);
            return Ok(());
        }

        self.send_line(line)
    }

    fn send_line(&mut self, line: String) -> Result<()> {
        match self.input.as_mut() {
            Some(InputChannel::Piped(tx)) => tx
                .send(line.into_bytes())
                .map_err(|_| TerminalError::ChannelClosed),
            Some(InputChannel::Pty(writer)) => writer
                .write_all(line.as_bytes())
                .and_then(|_| writer.flush())
                .map_err(|e| {
                    debug!("pty write failed: {}", e);
                    TerminalError::ChannelClosed
                }),
            None => Err(TerminalError::ChannelClosed),
        }
    }

    /// True once the process has exited, on its own or because it was killed
    pub fn has_terminated(&self) -> bool {
        self.exit.get().is_some()
    }

    /// Exit code, if the process has exited with one
    pub fn exit_code(&self) -> Option<i32> {
        self.exit.get().copied().flatten()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &ShellCommand {
        &self.command
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Signal cancellation and release handles. Returns false if already closed.
    fn begin_close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;

        if self.started {
            info!("Closing shell (pid {:?})", self.pid);
        }

        // Wakes the multiplexer and makes the exit watcher kill the child
        self.cancel.send_replace(true);
        // Dropping the sender ends the stdin writer, which closes stdin
        self.input = None;
        self.pending.clear();
        if let Some(mut pty) = self.pty.take() {
            pty.kill();
        }

        true
    }

    /// Dispose without waiting. Safe to call repeatedly and from any thread.
    ///
    /// Outstanding tasks are awaited by a detached reaper on the runtime the
    /// process was started on.
    pub fn close(&mut self) {
        if !self.begin_close() {
            return;
        }

        let tasks = std::mem::take(&mut self.tasks);
        if tasks.is_empty() {
            return;
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.spawn(join_all(tasks));
        }
    }

    /// Dispose and wait for every background task to finish (bounded by a timeout)
    pub async fn shutdown(&mut self) {
        self.begin_close();

        let tasks = std::mem::take(&mut self.tasks);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, join_all(tasks))
            .await
            .is_err()
        {
            warn!("Timed out waiting for shell tasks to finish");
        }
        self.runtime = None;
    }
}

impl Drop for ShellProcess {
    fn drop(&mut self) {
        self.close();
    }
}

/// Await background tasks, ignoring cancellation and panics
async fn join_all(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            debug!("Background task ended abnormally: {}", e);
        }
    }
}

/// Forward queued input to the child's stdin until the channel or the pipe closes
async fn pump_input(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(bytes) = rx.recv().await {
        if let Err(e) = stdin.write_all(&bytes).await {
            debug!("stdin closed: {}", e);
            break;
        }
        if let Err(e) = stdin.flush().await {
            debug!("stdin flush failed: {}", e);
            break;
        }
    }
}

/// Wait for the child to exit, killing it first if cancellation fires
async fn watch_exit(
    mut child: Child,
    exit: Arc<OnceLock<Option<i32>>>,
    mut cancel: watch::Receiver<bool>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = multiplexer::cancelled(&mut cancel) => {
            if let Err(e) = child.start_kill() {
                debug!("kill: {}", e);
            }
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!("Failed to wait for shell: {}", e);
            None
        }
    };
    info!("Shell exited with code {:?}", code);
    let _ = exit.set(code);
}
