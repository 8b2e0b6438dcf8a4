//! In-process fake worker for tests.
//!
//! [`FakeLauncher`] stands in for `llama-cli`: each launch wires a pair of
//! in-memory pipes to a scripted task that reads prompt lines and writes
//! reply lines, so supervisor and dialogue code can be exercised without a
//! model on disk.

use crate::{Error, WorkerLauncher, WorkerPipes};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

const PIPE_CAPACITY: usize = 64 * 1024;

type Script = dyn Fn(&str) -> Option<Vec<String>> + Send + Sync;

#[derive(Clone)]
enum Behavior {
    Reply(Arc<Script>),
    Silent,
    Closing,
    Deaf,
    Failing,
}

#[derive(Default)]
struct State {
    launches: AtomicUsize,
    interleaved: AtomicBool,
    transcript: Mutex<Vec<String>>,
}

/// A launcher whose workers run a script instead of a model.
#[derive(Clone)]
pub struct FakeLauncher {
    behavior: Behavior,
    reply_delay: Duration,
    exit_after_reply: bool,
    state: Arc<State>,
}

impl FakeLauncher {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            reply_delay: Duration::ZERO,
            exit_after_reply: false,
            state: Arc::new(State::default()),
        }
    }

    /// Call `script` for every line received; `Some(lines)` is written back
    /// as the reply, `None` keeps reading.
    pub fn replying<F>(script: F) -> Self
    where
        F: Fn(&str) -> Option<Vec<String>> + Send + Sync + 'static,
    {
        Self::with_behavior(Behavior::Reply(Arc::new(script)))
    }

    /// Reply with `lines` followed by the sentinel once `cue` appears in a line.
    pub fn answering(cue: impl Into<String>, lines: &[&str]) -> Self {
        let cue = cue.into();
        let mut reply: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        reply.push(crate::DEFAULT_SENTINEL.to_string());
        Self::replying(move |line| line.contains(&cue).then(|| reply.clone()))
    }

    /// A worker that reads forever and never answers.
    pub fn silent() -> Self {
        Self::with_behavior(Behavior::Silent)
    }

    /// A worker that exits as soon as it receives its first line.
    pub fn closing() -> Self {
        Self::with_behavior(Behavior::Closing)
    }

    /// A worker whose stdin is already closed, so the first write fails.
    pub fn deaf() -> Self {
        Self::with_behavior(Behavior::Deaf)
    }

    /// A launcher that cannot start anything.
    pub fn failing() -> Self {
        Self::with_behavior(Behavior::Failing)
    }

    /// Wait this long before writing each reply.
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Exit right after the first reply is written.
    pub fn exit_after_reply(mut self) -> Self {
        self.exit_after_reply = true;
        self
    }

    /// Number of successful launches.
    pub fn launches(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    /// Every line received by any worker from this launcher, in order.
    pub fn transcript(&self) -> Vec<String> {
        self.state
            .transcript
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Whether input arrived while a reply was still owed.
    pub fn saw_interleaving(&self) -> bool {
        self.state.interleaved.load(Ordering::SeqCst)
    }

    fn record(&self, line: &str) {
        if let Ok(mut transcript) = self.state.transcript.lock() {
            transcript.push(line.to_string());
        }
    }
}

impl WorkerLauncher for FakeLauncher {
    fn launch(&self) -> Result<WorkerPipes, Error> {
        if matches!(self.behavior, Behavior::Failing) {
            return Err(Error::Spawn {
                program: "fake-llama".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such worker"),
            });
        }

        let (client_stdin, worker_stdin) = tokio::io::duplex(PIPE_CAPACITY);
        let (worker_stdout, client_stdout) = tokio::io::duplex(PIPE_CAPACITY);
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        if matches!(self.behavior, Behavior::Deaf) {
            drop(worker_stdin);
        } else {
            tokio::spawn(run(self.clone(), worker_stdin, worker_stdout));
        }

        Ok(WorkerPipes {
            stdin: Box::new(client_stdin),
            stdout: Box::new(client_stdout),
            child: None,
        })
    }
}

async fn run(fake: FakeLauncher, stdin: DuplexStream, mut stdout: DuplexStream) {
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let received = line.trim_end_matches(['\r', '\n']);
        fake.record(received);

        let reply = match &fake.behavior {
            Behavior::Reply(script) => script(received),
            Behavior::Silent => None,
            Behavior::Closing | Behavior::Deaf | Behavior::Failing => return,
        };
        let Some(reply) = reply else {
            continue;
        };

        if !fake.reply_delay.is_zero() {
            tokio::time::sleep(fake.reply_delay).await;
        }
        if has_pending_input(&mut reader).await {
            fake.state.interleaved.store(true, Ordering::SeqCst);
        }

        for reply_line in reply {
            let bytes = format!("{reply_line}\n");
            if stdout.write_all(bytes.as_bytes()).await.is_err() {
                return;
            }
        }
        if fake.exit_after_reply {
            return;
        }
    }
}

async fn has_pending_input<R: AsyncBufRead + Unpin>(reader: &mut R) -> bool {
    match tokio::time::timeout(Duration::from_millis(1), reader.fill_buf()).await {
        Ok(Ok(buf)) => !buf.is_empty(),
        _ => false,
    }
}
