//! Scripted workers for tests.
//!
//! [`MockSpawner`] runs a frame script on a tokio task instead of a child
//! process. A [`WorkerProbe`] shared with the spawned worker lets tests see
//! whether it was terminated.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use drip_backend::mock::mock_frames;
use drip_backend::MockConfig;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{channel, ByteSink, ByteSource, SpawnError, Spawner, Worker, Workload};

#[derive(Debug, Default)]
struct ProbeState {
    spawned: AtomicBool,
    finished: AtomicBool,
    terminations: AtomicUsize,
}

/// Observes the worker a [`MockSpawner`] produced.
#[derive(Debug, Clone, Default)]
pub struct WorkerProbe {
    state: Arc<ProbeState>,
}

impl WorkerProbe {
    pub fn was_spawned(&self) -> bool {
        self.state.spawned.load(Ordering::SeqCst)
    }

    /// The script ran to completion.
    pub fn finished(&self) -> bool {
        self.state.finished.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.state.terminations.load(Ordering::SeqCst)
    }

    pub fn was_terminated(&self) -> bool {
        self.terminations() > 0
    }
}

#[derive(Debug, Clone)]
enum Script {
    Frames(MockConfig),
    Chunks(Vec<Bytes>),
    Silent,
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct MockSpawner {
    script: Script,
    probe: WorkerProbe,
}

impl MockSpawner {
    /// Emit the wire frames for `config`, one chunk per frame.
    pub fn new(config: MockConfig) -> Self {
        Self::with_script(Script::Frames(config))
    }

    /// Emit raw chunks exactly as given.
    pub fn chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::with_script(Script::Chunks(chunks.into_iter().map(Into::into).collect()))
    }

    /// A worker that never writes and never exits on its own.
    pub fn silent() -> Self {
        Self::with_script(Script::Silent)
    }

    /// Spawning fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(Script::Fail(message.into()))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            probe: WorkerProbe::default(),
        }
    }

    pub fn probe(&self) -> WorkerProbe {
        self.probe.clone()
    }
}

impl Spawner for MockSpawner {
    fn spawn(&self, workload: &Workload) -> Result<(Box<dyn Worker>, ByteSource), SpawnError> {
        if let Script::Fail(message) = &self.script {
            return Err(SpawnError::Start {
                program: workload.program.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, message.clone()),
            });
        }

        let (sink, source) = channel();
        let probe = self.probe.clone();
        probe.state.spawned.store(true, Ordering::SeqCst);

        let task = tokio::spawn(run_script(self.script.clone(), sink, probe.clone()));
        Ok((Box::new(MockWorker { task, probe }), source))
    }
}

async fn run_script(script: Script, sink: ByteSink, probe: WorkerProbe) {
    match script {
        Script::Frames(config) => {
            let mut frames = std::pin::pin!(mock_frames(config));
            while let Some(chunk) = frames.next().await {
                if !sink.send(chunk) {
                    return;
                }
            }
        }
        Script::Chunks(chunks) => {
            for chunk in chunks {
                if !sink.send(chunk) {
                    return;
                }
            }
        }
        Script::Silent => {
            let _sink = sink;
            std::future::pending::<()>().await;
        }
        Script::Fail(_) => {}
    }
    probe.state.finished.store(true, Ordering::SeqCst);
}

struct MockWorker {
    task: JoinHandle<()>,
    probe: WorkerProbe,
}

impl Worker for MockWorker {
    fn is_finished(&mut self) -> bool {
        self.task.is_finished()
    }

    fn terminate(&mut self) {
        self.probe.state.terminations.fetch_add(1, Ordering::SeqCst);
        self.task.abort();
    }

    fn id(&self) -> Option<u32> {
        None
    }
}
