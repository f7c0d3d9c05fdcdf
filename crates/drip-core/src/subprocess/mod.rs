//! Out-of-process worker channel.
//!
//! A [`Spawner`] turns a [`Workload`] into a [`Worker`] handle plus a
//! [`ByteSource`]. The source never blocks: a reader task pumps the child's
//! stdout into a channel and the session polls it between suspension points.

pub mod mock;

use std::io;
use std::process::Stdio;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::debug;

const READ_CHUNK: usize = 4096;

/// What to run for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workload {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Written to the worker's stdin, which is then closed.
    pub stdin: Option<Vec<u8>>,
}

impl Workload {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to start {program}: {source}")]
    Start { program: String, source: io::Error },
    #[error("no worker command configured")]
    NoCommand,
}

/// Handle to a running worker.
pub trait Worker: Send {
    /// True once the worker has exited. A failure to query counts as exited.
    fn is_finished(&mut self) -> bool;
    /// Kill the worker. Idempotent and safe after a natural exit.
    fn terminate(&mut self);
    fn id(&self) -> Option<u32>;
}

/// The process-spawning primitive.
pub trait Spawner {
    fn spawn(&self, workload: &Workload) -> Result<(Box<dyn Worker>, ByteSource), SpawnError>;
}

/// Readiness of a [`ByteSource`].
#[derive(Debug)]
pub enum Readable {
    /// This many bytes can be read without waiting.
    Available(usize),
    /// Nothing right now; the writer is still open.
    Empty,
    /// The writer is gone and everything has been read.
    Closed,
    /// The reader hit an error. Reported once; the source closes afterwards.
    Failed(io::Error),
}

/// Write half of a byte channel.
#[derive(Debug, Clone)]
pub struct ByteSink {
    tx: mpsc::UnboundedSender<io::Result<Bytes>>,
}

impl ByteSink {
    /// Returns false once the source has been dropped.
    pub fn send(&self, chunk: Bytes) -> bool {
        self.tx.send(Ok(chunk)).is_ok()
    }

    pub fn fail(self, error: io::Error) {
        let _ = self.tx.send(Err(error));
    }
}

/// Non-blocking read half of a worker's output.
#[derive(Debug)]
pub struct ByteSource {
    rx: mpsc::UnboundedReceiver<io::Result<Bytes>>,
    pending: BytesMut,
    failed: Option<io::Error>,
    closed: bool,
}

/// Create a connected sink/source pair.
pub fn channel() -> (ByteSink, ByteSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ByteSink { tx },
        ByteSource {
            rx,
            pending: BytesMut::new(),
            failed: None,
            closed: false,
        },
    )
}

impl ByteSource {
    /// Check how much can be read right now without waiting.
    pub fn poll_readable(&mut self) -> Readable {
        self.fill();
        if let Some(e) = self.failed.take() {
            return Readable::Failed(e);
        }
        if !self.pending.is_empty() {
            Readable::Available(self.pending.len())
        } else if self.closed {
            Readable::Closed
        } else {
            Readable::Empty
        }
    }

    /// Take up to `max` buffered bytes. Never waits.
    pub fn read_available(&mut self, max: usize) -> Bytes {
        self.fill();
        let n = max.min(self.pending.len());
        self.pending.split_to(n).freeze()
    }

    /// Wait until [`poll_readable`](Self::poll_readable) would report
    /// something other than `Empty`. Cancel-safe.
    pub async fn wait_readable(&mut self) {
        if !self.pending.is_empty() || self.failed.is_some() || self.closed {
            return;
        }
        match self.rx.recv().await {
            Some(Ok(chunk)) => self.pending.extend_from_slice(&chunk),
            Some(Err(e)) => self.failed = Some(e),
            None => self.closed = true,
        }
    }

    /// Discard everything readable right now. Returns the number of bytes dropped.
    pub fn drain(&mut self) -> usize {
        self.fill();
        self.failed = None;
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    fn fill(&mut self) {
        while self.failed.is_none() && !self.closed {
            match self.rx.try_recv() {
                Ok(Ok(chunk)) => self.pending.extend_from_slice(&chunk),
                Ok(Err(e)) => self.failed = Some(e),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.closed = true,
            }
        }
    }
}

/// A real child process.
pub struct ProcessWorker {
    child: Child,
    killed: bool,
}

impl ProcessWorker {
    pub fn new(child: Child) -> Self {
        Self {
            child,
            killed: false,
        }
    }
}

impl Worker for ProcessWorker {
    fn is_finished(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = ?self.child.id(), %status, "worker exited");
                true
            }
            Ok(None) => false,
            Err(e) => {
                debug!(error = %e, "worker status unavailable");
                true
            }
        }
    }

    fn terminate(&mut self) {
        if self.killed {
            return;
        }
        self.killed = true;
        if let Err(e) = self.child.start_kill() {
            // Already reaped.
            debug!(error = %e, "kill skipped");
        }
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Spawns workers as OS processes. Must be called inside a tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSpawner;

impl Spawner for ProcessSpawner {
    fn spawn(&self, workload: &Workload) -> Result<(Box<dyn Worker>, ByteSource), SpawnError> {
        if workload.program.is_empty() {
            return Err(SpawnError::NoCommand);
        }

        let mut cmd = Command::new(&workload.program);
        cmd.args(&workload.args)
            .envs(workload.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if workload.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SpawnError::Start {
            program: workload.program.clone(),
            source,
        })?;
        let pid = child.id();
        debug!(?pid, program = %workload.program, "worker started");

        if let (Some(mut stdin), Some(payload)) = (child.stdin.take(), workload.stdin.clone()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!(error = %e, "worker stdin closed early");
                }
                let _ = stdin.shutdown().await;
            });
        }

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr, pid));
        }

        let (sink, source) = channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, sink));
        }

        Ok((Box::new(ProcessWorker::new(child)), source))
    }
}

/// Copy a reader into a sink until EOF, error, or the source goes away.
pub async fn pump<R>(mut reader: R, sink: ByteSink)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if !sink.send(Bytes::copy_from_slice(&buf[..n])) {
                    break;
                }
            }
            Err(e) => {
                sink.fail(e);
                break;
            }
        }
    }
}

async fn forward_stderr(stderr: ChildStderr, pid: Option<u32>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(?pid, "worker: {line}");
    }
}
