//! Pseudo-terminal backend
//!
//! Used by the `PseudoTerminal` shell flavor. The pty master gives one merged
//! output stream and one input stream; both are blocking, so the caller reads
//! them from a blocking task.

use std::io::{Read, Write};
use std::path::Path;

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tracing::debug;

use super::error::{Result, TerminalError};
use super::shell::ShellCommand;

/// Everything produced by a successful pty spawn
pub struct PtySpawn {
    /// Keeps the pty alive and can kill the child
    pub handle: PtyHandle,
    /// Merged output of the child
    pub reader: Box<dyn Read + Send>,
    /// Child's input
    pub writer: Box<dyn Write + Send>,
    /// Child process, to be waited on
    pub child: Box<dyn Child + Send + Sync>,
}

/// Owned side of an open pty
pub struct PtyHandle {
    /// Dropping the master hangs up the pty
    _master: Box<dyn MasterPty + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
}

impl PtyHandle {
    /// Kill the child. Errors (already exited) are ignored.
    pub fn kill(&mut self) {
        if let Err(e) = self.killer.kill() {
            debug!("pty kill: {}", e);
        }
    }
}

/// Open a pty of `rows` x `cols` and spawn `command` in `cwd` on its slave side
pub fn spawn(command: &ShellCommand, cwd: &Path, rows: u16, cols: u16) -> Result<PtySpawn> {
    let launch_error = |e: anyhow::Error| TerminalError::launch(command.program.clone(), e);

    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(launch_error)?;

    let mut cmd = CommandBuilder::new(&command.program);
    cmd.args(&command.args);
    cmd.cwd(cwd);

    let child = pair.slave.spawn_command(cmd).map_err(launch_error)?;
    // The child holds its own copy of the slave
    drop(pair.slave);

    let reader = pair.master.try_clone_reader().map_err(launch_error)?;
    let writer = pair.master.take_writer().map_err(launch_error)?;
    let killer = child.clone_killer();

    Ok(PtySpawn {
        handle: PtyHandle {
            _master: pair.master,
            killer,
        },
        reader,
        writer,
        child,
    })
}

/// Block until `child` exits and return its exit code
pub fn wait_for_exit(mut child: Box<dyn Child + Send + Sync>) -> Option<i32> {
    match child.wait() {
        Ok(status) => Some(status.exit_code() as i32),
        Err(e) => {
            debug!("pty wait failed: {}", e);
            None
        }
    }
}
