//! Text adventure engine with worker-driven NPC dialogue.
//!
//! This crate provides:
//! - A small world of locations, NPCs, inventory and quests
//! - NPC dialogue voiced by a persistent `llama-cli` worker
//! - A command interpreter for terminal play
//! - JSON save/load
//!
//! # Quick Start
//!
//! ```ignore
//! use tavern_core::{DialogueEngine, GameSession, GameWorld};
//! use llama::WorkerConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = DialogueEngine::from_config(WorkerConfig::from_env()?);
//!     let mut session = GameSession::new(GameWorld::village(), engine);
//!
//!     println!("{}", session.handle("talk to martha").await.text);
//!     println!("{}", session.handle("Have you seen my cat?").await.text);
//!     Ok(())
//! }
//! ```

pub mod dialogue;
pub mod persist;
pub mod session;
pub mod testing;
pub mod world;

// Primary public API
pub use dialogue::{DialogueEngine, DialogueLog, DialogueRequest};
pub use persist::{PersistError, SavedGame};
pub use session::{GameSession, Response, SessionError};
pub use testing::TestHarness;
pub use world::{GameWorld, Location, Npc, Player, Quest, QuestStatus};
