//! Worker supervision.
//!
//! A [`Worker`] owns at most one running worker process. It is started
//! lazily by the first turn and reused by every later turn. All access to
//! the pipes goes through one async mutex, so turns never interleave.

use crate::codec::{self, Frame};
use crate::{Error, WorkerConfig};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Raw pipes of a freshly launched worker.
pub struct WorkerPipes {
    /// Worker stdin.
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,

    /// Worker stdout.
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,

    /// The OS process, if there is one.
    pub child: Option<Child>,
}

/// Something that can start a worker.
pub trait WorkerLauncher: Send + Sync {
    /// Start a worker and hand back its pipes.
    fn launch(&self) -> Result<WorkerPipes, Error>;
}

/// Launches `llama-cli` as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: WorkerConfig,
}

impl ProcessLauncher {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    fn spawn_error(&self, source: std::io::Error) -> Error {
        Error::Spawn {
            program: self.config.program.display().to_string(),
            source,
        }
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self) -> Result<WorkerPipes, Error> {
        let mut child = Command::new(&self.config.program)
            .args(self.config.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.spawn_error(std::io::Error::other("stdin was not piped")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.spawn_error(std::io::Error::other("stdout was not piped")))?;

        Ok(WorkerPipes {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            child: Some(child),
        })
    }
}

/// A started worker with its pipes. Only [`Worker`] holds one.
pub(crate) struct WorkerHandle {
    stdin: Box<dyn AsyncWrite + Send + Unpin>,
    stdout: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    child: Option<Child>,
}

impl WorkerHandle {
    pub(crate) fn new(pipes: WorkerPipes) -> Self {
        Self {
            stdin: pipes.stdin,
            stdout: BufReader::new(pipes.stdout),
            child: pipes.child,
        }
    }

    /// OS process id, if the worker is a real process that has not been reaped.
    pub(crate) fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Run one turn over the pipes.
    pub(crate) async fn exchange(&mut self, prompt: &str, sentinel: &str) -> Result<Frame, Error> {
        codec::send_turn(&mut self.stdin, &mut self.stdout, prompt, sentinel).await
    }

    /// Close the pipes and stop the process.
    async fn terminate(self) {
        let Self { stdin, stdout, child } = self;
        drop(stdin);
        drop(stdout);

        if let Some(mut child) = child {
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "worker already gone");
            }
        }
    }
}

/// Supervisor for one persistent worker.
pub struct Worker<L> {
    launcher: L,
    handle: Mutex<Option<WorkerHandle>>,
    sentinel: String,
    turn_timeout: Option<Duration>,
    launches: AtomicUsize,
}

impl Worker<ProcessLauncher> {
    /// A supervisor that spawns the configured `llama-cli` process.
    pub fn from_config(config: WorkerConfig) -> Self {
        let launcher = ProcessLauncher::new(config.clone());
        Self::new(launcher, &config)
    }
}

impl<L: WorkerLauncher> Worker<L> {
    /// Create a supervisor. Nothing is launched until the first turn.
    pub fn new(launcher: L, config: &WorkerConfig) -> Self {
        Self {
            launcher,
            handle: Mutex::new(None),
            sentinel: config.sentinel.clone(),
            turn_timeout: config.turn_timeout,
            launches: AtomicUsize::new(0),
        }
    }

    /// Send one prompt and wait for the framed reply.
    ///
    /// The worker is launched if no handle exists. A handle that saw its
    /// turn through to the sentinel is kept for the next call; on any
    /// failure, or when the stream ends mid-turn, it is discarded so the
    /// next call launches a fresh worker.
    ///
    /// A kept handle keeps whatever the worker wrote past the sentinel. If
    /// the worker answers one prompt with several frames, the extra frames
    /// are returned by later calls; framing does not resynchronize.
    pub async fn send(&self, prompt: &str, cancel: &CancellationToken) -> Result<String, Error> {
        let mut slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            slot = self.handle.lock() => slot,
        };

        let mut handle = match slot.take() {
            Some(handle) => handle,
            None => self.start()?,
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.exchange(&mut handle, prompt) => result,
        };

        match outcome {
            Ok(frame) if frame.terminated => {
                *slot = Some(handle);
                Ok(frame.text)
            }
            Ok(frame) => {
                tracing::warn!(
                    partial_bytes = frame.text.len(),
                    "worker output ended mid-turn; discarding handle"
                );
                handle.terminate().await;
                if frame.text.is_empty() {
                    Err(Error::WorkerExited)
                } else {
                    Ok(frame.text)
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "worker turn failed; discarding handle");
                handle.terminate().await;
                Err(err)
            }
        }
    }

    /// Whether a worker handle is currently held.
    pub async fn is_running(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// Number of successful launches so far.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Stop the worker, if one is running.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            tracing::info!(pid = ?handle.id(), "stopping worker");
            handle.terminate().await;
        }
    }

    fn start(&self) -> Result<WorkerHandle, Error> {
        let handle = WorkerHandle::new(self.launcher.launch()?);
        let launches = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(pid = ?handle.id(), launches, "worker started");
        Ok(handle)
    }

    async fn exchange(&self, handle: &mut WorkerHandle, prompt: &str) -> Result<Frame, Error> {
        let turn = handle.exchange(prompt, &self.sentinel);
        let frame = match self.turn_timeout {
            Some(limit) => tokio::time::timeout(limit, turn)
                .await
                .map_err(|_| Error::Timeout(limit))??,
            None => turn.await?,
        };

        tracing::debug!(
            prompt_bytes = prompt.len(),
            reply_bytes = frame.text.len(),
            terminated = frame.terminated,
            "worker turn complete"
        );
        Ok(frame)
    }
}
