//! Worker-backed dialogue engine.

use super::{prompt, DialogueRequest};
use llama::{ProcessLauncher, Worker, WorkerConfig, WorkerLauncher};
use tokio_util::sync::CancellationToken;

/// The reply used whenever the worker cannot produce one.
pub fn fallback(npc_name: &str) -> String {
    format!("{npc_name} looks at you thoughtfully but seems distracted and doesn't respond clearly.")
}

/// Voices NPCs through a persistent worker.
///
/// [`generate_response`](Self::generate_response) never fails: spawn
/// errors, broken pipes, deadlines and cancellation all come back as the
/// NPC's [`fallback`] line.
pub struct DialogueEngine<L = ProcessLauncher> {
    worker: Worker<L>,
    shutdown: CancellationToken,
}

impl DialogueEngine<ProcessLauncher> {
    /// An engine driving the configured `llama-cli` binary.
    pub fn from_config(config: WorkerConfig) -> Self {
        Self::new(Worker::from_config(config))
    }
}

impl<L: WorkerLauncher> DialogueEngine<L> {
    pub fn new(worker: Worker<L>) -> Self {
        Self {
            worker,
            shutdown: CancellationToken::new(),
        }
    }

    /// The underlying worker supervisor.
    pub fn worker(&self) -> &Worker<L> {
        &self.worker
    }

    /// A token for cancelling one turn. Also cancelled by [`shutdown`](Self::shutdown).
    pub fn turn_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Generate the NPC's reply to the player's line.
    pub async fn generate_response(&self, request: &DialogueRequest<'_>) -> String {
        self.generate_response_with(request, &self.turn_token()).await
    }

    /// Like [`generate_response`](Self::generate_response), cancellable through `cancel`.
    pub async fn generate_response_with(
        &self,
        request: &DialogueRequest<'_>,
        cancel: &CancellationToken,
    ) -> String {
        let prompt = prompt::build(request);

        match self.worker.send(&prompt, cancel).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(npc = %request.npc.name, error = %err, "dialogue turn failed");
                fallback(&request.npc.name)
            }
        }
    }

    /// Cancel in-flight turns and stop the worker.
    ///
    /// Later calls return the fallback line.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.worker.shutdown().await;
    }
}
