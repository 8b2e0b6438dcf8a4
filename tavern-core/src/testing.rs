//! Testing utilities for the game.
//!
//! This module provides tools for integration testing:
//! - `TestHarness` for scripted sessions against a fake worker
//! - `fake_engine` for dialogue tests without a model

use crate::dialogue::DialogueEngine;
use crate::session::{GameSession, Response};
use crate::world::GameWorld;
use llama::testing::FakeLauncher;
use llama::{Worker, WorkerConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Turn deadline used by fake engines, short enough for silent-worker tests.
pub const FAKE_TURN_TIMEOUT: Duration = Duration::from_millis(250);

/// A dialogue engine backed by `launcher`.
pub fn fake_engine(launcher: &FakeLauncher) -> DialogueEngine<FakeLauncher> {
    let config = WorkerConfig::default().with_turn_timeout(Some(FAKE_TURN_TIMEOUT));
    DialogueEngine::new(Worker::new(launcher.clone(), &config))
}

/// Test harness for running game scenarios.
pub struct TestHarness {
    /// The session under test.
    pub session: GameSession<FakeLauncher>,
    /// The launcher behind the session's worker.
    pub launcher: FakeLauncher,
}

impl TestHarness {
    /// A harness over the starting village.
    pub fn new(launcher: FakeLauncher) -> Self {
        Self::with_world(GameWorld::village(), launcher)
    }

    /// A harness over a custom world.
    pub fn with_world(world: GameWorld, launcher: FakeLauncher) -> Self {
        let session = GameSession::new(world, fake_engine(&launcher));
        Self { session, launcher }
    }

    /// Resolve save file names against `dir`.
    pub fn with_save_dir(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            session: self.session.with_save_dir(dir),
            launcher: self.launcher,
        }
    }

    /// Send one line of input.
    pub async fn input(&mut self, line: &str) -> Response {
        self.session.handle(line).await
    }

    /// Send one line of input, interruptible through `cancel`.
    pub async fn input_with(&mut self, line: &str, cancel: &CancellationToken) -> Response {
        self.session.handle_with(line, cancel).await
    }

    /// Send several lines, collecting the responses.
    pub async fn script(&mut self, lines: &[&str]) -> Vec<Response> {
        let mut responses = Vec::with_capacity(lines.len());
        for line in lines {
            responses.push(self.session.handle(line).await);
        }
        responses
    }

    /// The world as the session sees it.
    pub fn world(&self) -> &GameWorld {
        self.session.world()
    }
}
