//! Stream multiplexer
//!
//! Merges a shell's stdout and stderr into one ordered event stream. One read is
//! kept in flight per channel; whichever completes first is published and
//! re-issued while the other stays pending. The merged sink is an unbounded
//! channel: the multiplexer is its only writer, the session driver its only
//! reader, draining it on every tick.
//!
//! ```text
//! stdout ──read──┐
//!                ├──select──> OutputSink ──> MergedOutput::drain (per tick)
//! stderr ──read──┘
//! ```

use std::io::Read;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use super::error::StreamSource;

/// Bytes requested per read
pub const READ_CHUNK_SIZE: usize = 4096;

/// One item of the merged stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// The complete result of a single read on one channel
    Data { source: StreamSource, bytes: Vec<u8> },
    /// A channel failed and will not be read again
    Fault { source: StreamSource, message: String },
}

/// Writer half of the merged stream
pub type OutputSink = mpsc::UnboundedSender<OutputEvent>;

/// Result of draining the merged stream
#[derive(Debug, Default)]
pub struct Drained {
    /// Events in the order their reads completed
    pub events: Vec<OutputEvent>,
    /// All writers are gone: both channels ended or the multiplexer was cancelled
    pub closed: bool,
}

/// Reader half of the merged stream
pub struct MergedOutput {
    rx: mpsc::UnboundedReceiver<OutputEvent>,
    closed: bool,
}

impl MergedOutput {
    /// Take everything that is available right now without waiting
    pub fn drain(&mut self) -> Drained {
        let mut drained = Drained::default();

        loop {
            match self.rx.try_recv() {
                Ok(event) => drained.events.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }

        drained.closed = self.closed;
        drained
    }

    /// Whether the writers are known to be gone (as of the last drain)
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Create a connected sink/reader pair
pub fn merged_channel() -> (OutputSink, MergedOutput) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, MergedOutput { rx, closed: false })
}

/// Create a cancellation signal shared by all background tasks of one process
pub fn cancel_signal() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolve once cancellation is requested (or the signal owner is gone)
pub async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|flag| *flag).await;
}

/// What to do with a channel after one read
enum ReadFlow {
    /// Keep reading this channel
    Continue,
    /// This channel is finished (EOF or fault)
    Ended,
    /// Nobody listens any more, stop everything
    Detached,
}

fn publish(
    sink: &OutputSink,
    source: StreamSource,
    read: std::io::Result<usize>,
    buf: &[u8],
) -> ReadFlow {
    match read {
        Ok(0) => {
            debug!("{} reached end of stream", source);
            ReadFlow::Ended
        }
        Ok(n) => {
            let event = OutputEvent::Data {
                source,
                bytes: buf[..n].to_vec(),
            };
            if sink.send(event).is_err() {
                ReadFlow::Detached
            } else {
                ReadFlow::Continue
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => ReadFlow::Continue,
        Err(e) => {
            warn!("Read fault on {}: {}", source, e);
            let event = OutputEvent::Fault {
                source,
                message: e.to_string(),
            };
            if sink.send(event).is_err() {
                ReadFlow::Detached
            } else {
                ReadFlow::Ended
            }
        }
    }
}

/// Race reads on `stdout` and `stderr`, publishing each completed read to `sink`.
///
/// Returns when both channels are finished, the sink is dropped, or `cancel` fires.
/// A fault on one channel only stops that channel.
pub async fn run_piped<O, E>(
    mut stdout: O,
    mut stderr: E,
    sink: OutputSink,
    mut cancel: watch::Receiver<bool>,
) where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = vec![0u8; READ_CHUNK_SIZE];
    let mut err_buf = vec![0u8; READ_CHUNK_SIZE];
    let mut out_open = true;
    let mut err_open = true;

    if *cancel.borrow() {
        return;
    }

    while out_open || err_open {
        // Both reads are cancel safe: a losing branch never consumed any bytes
        let flow = tokio::select! {
            _ = cancelled(&mut cancel) => {
                debug!("Multiplexer cancelled");
                break;
            }
            read = stdout.read(&mut out_buf), if out_open => {
                match publish(&sink, StreamSource::Stdout, read, &out_buf) {
                    ReadFlow::Ended => {
                        out_open = false;
                        ReadFlow::Continue
                    }
                    flow => flow,
                }
            }
            read = stderr.read(&mut err_buf), if err_open => {
                match publish(&sink, StreamSource::Stderr, read, &err_buf) {
                    ReadFlow::Ended => {
                        err_open = false;
                        ReadFlow::Continue
                    }
                    flow => flow,
                }
            }
        };

        if let ReadFlow::Detached = flow {
            debug!("Merged output reader is gone, stopping multiplexer");
            break;
        }
    }
}

/// Spawn [`run_piped`] on the current runtime
pub fn spawn_piped<O, E>(
    stdout: O,
    stderr: E,
    sink: OutputSink,
    cancel: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(run_piped(stdout, stderr, sink, cancel))
}

/// Read a blocking single-channel source (a pty master) into `sink`.
///
/// Cancellation is checked between reads; a read blocked on a live pty returns
/// once the child is killed and the pty hangs up.
pub fn spawn_blocking_reader(
    mut reader: Box<dyn Read + Send>,
    source: StreamSource,
    sink: OutputSink,
    cancel: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            if *cancel.borrow() {
                break;
            }
            let read = reader.read(&mut buf);
            match publish(&sink, source, read, &buf) {
                ReadFlow::Continue => {}
                ReadFlow::Ended | ReadFlow::Detached => break,
            }
        }
    })
}
