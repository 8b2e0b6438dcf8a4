//! GameSession - the command interpreter for a running game.
//!
//! A session owns the world, the dialogue engine, and the conversation
//! log. Each line of player input goes through [`GameSession::handle`],
//! which either runs a command or, while talking to an NPC, forwards the
//! line to the dialogue engine.

use crate::dialogue::{DialogueEngine, DialogueLog, DialogueRequest};
use crate::persist::{self, PersistError, SavedGame, DEFAULT_SAVE_FILE};
use crate::world::{GameWorld, MoveError};
use llama::{ProcessLauncher, WorkerLauncher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Lines that end a conversation.
const FAREWELLS: [&str; 4] = ["exit", "quit", "bye", "goodbye"];

/// Exchanges shown by the `history` command.
const HISTORY_SHOWN: usize = 10;

/// Errors from building a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Save places the player at unknown location `{0}`")]
    UnknownLocation(String),
}

/// Result of one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Text to show the player.
    pub text: String,

    /// Whether the player asked to leave the game.
    pub quit: bool,
}

impl Response {
    fn say(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: false,
        }
    }

    fn quit(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: true,
        }
    }
}

/// A running game.
pub struct GameSession<L = ProcessLauncher> {
    world: GameWorld,
    engine: DialogueEngine<L>,
    log: DialogueLog,
    conversation: Option<String>,
    save_dir: PathBuf,
}

impl<L: WorkerLauncher> GameSession<L> {
    /// Start a session over `world`.
    pub fn new(world: GameWorld, engine: DialogueEngine<L>) -> Self {
        Self {
            world,
            engine,
            log: DialogueLog::new(),
            conversation: None,
            save_dir: PathBuf::from("."),
        }
    }

    /// Start a session from the village and then apply a save file over it.
    pub async fn load(
        path: impl AsRef<Path>,
        engine: DialogueEngine<L>,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(GameWorld::village(), engine);
        session.restore(path.as_ref()).await?;
        Ok(session)
    }

    /// Directory that `save`, `load` and `saves` resolve names against.
    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut GameWorld {
        &mut self.world
    }

    pub fn engine(&self) -> &DialogueEngine<L> {
        &self.engine
    }

    pub fn log(&self) -> &DialogueLog {
        &self.log
    }

    /// Id of the NPC currently being talked to.
    pub fn conversation(&self) -> Option<&str> {
        self.conversation.as_deref()
    }

    /// Welcome banner and the starting location.
    pub fn intro(&self) -> String {
        format!(
            "Welcome, {}!\nType 'help' for available commands.\n\n{}",
            self.world.player.name,
            self.describe_location()
        )
    }

    /// Handle one line of player input.
    pub async fn handle(&mut self, input: &str) -> Response {
        let turn = self.engine.turn_token();
        self.handle_with(input, &turn).await
    }

    /// Like [`handle`](Self::handle), with a token that interrupts a
    /// dialogue turn. An interrupted turn ends the conversation.
    pub async fn handle_with(&mut self, input: &str, cancel: &CancellationToken) -> Response {
        if let Some(npc_id) = self.conversation.clone() {
            return self.converse(&npc_id, input, cancel).await;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some(first) = parts.first() else {
            return Response::say("");
        };
        let command = first.to_lowercase();
        let args = &parts[1..];

        match command.as_str() {
            "quit" | "exit" => Response::quit("Thanks for playing! Goodbye!"),
            "help" => Response::say(help_text()),
            "look" => Response::say(self.describe_location()),
            "inventory" => Response::say(self.describe_inventory()),
            "quests" => Response::say(self.describe_quests()),
            "status" => Response::say(self.describe_status()),
            "history" => Response::say(self.describe_history()),
            "talk" => Response::say(self.start_conversation(args)),
            "move" | "go" => Response::say(self.travel(args)),
            "save" => Response::say(self.save(args.first().copied()).await),
            "load" => Response::say(self.load_command(args.first().copied()).await),
            "saves" => Response::say(self.describe_saves().await),
            other => Response::say(format!(
                "Unknown command: {other}\nType 'help' for available commands."
            )),
        }
    }

    /// Walk away from the current conversation, if there is one.
    pub fn interrupt_conversation(&mut self) -> Option<String> {
        let npc_id = self.conversation.take()?;
        let name = self
            .world
            .npcs
            .get(&npc_id)
            .map(|npc| npc.name.as_str())
            .unwrap_or("them");
        Some(format!("You abruptly end the conversation with {name}."))
    }

    async fn converse(
        &mut self,
        npc_id: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> Response {
        let said = input.trim();
        let Some(npc) = self.world.npcs.get(npc_id) else {
            self.conversation = None;
            return Response::say("There's no one here to talk to anymore.");
        };
        let name = npc.name.clone();

        if FAREWELLS.contains(&said.to_lowercase().as_str()) {
            self.conversation = None;
            return Response::say(format!("You end your conversation with {name}."));
        }
        if said.is_empty() {
            return Response::say("You stand there silently...");
        }

        let request = DialogueRequest::new(npc, said).with_player(&self.world.player);
        let reply = self.engine.generate_response_with(&request, cancel).await;
        if cancel.is_cancelled() {
            tracing::info!(npc = %name, "conversation interrupted");
            let text = self.interrupt_conversation().unwrap_or_default();
            return Response::say(text);
        }
        self.log.record(name.as_str(), said, reply.as_str());

        Response::say(format!("{name}: {reply}"))
    }

    fn start_conversation(&mut self, args: &[&str]) -> String {
        if args.len() < 2 || !args[0].eq_ignore_ascii_case("to") {
            return "Usage: talk to [npc name]".to_string();
        }
        let wanted = args[1..].join(" ");

        let Some((id, npc)) = self.world.find_npc(&wanted) else {
            return format!("There's no one named '{wanted}' here.");
        };
        if !self.world.is_npc_here(id) {
            return format!("{} is not here right now.", npc.name);
        }

        let text = format!(
            "You approach {name}.\n{name}: *{manner}*\n(Say 'bye' to end the conversation.)",
            name = npc.name,
            manner = npc
                .dialogue_style
                .as_deref()
                .unwrap_or("looks at you expectantly"),
        );
        self.conversation = Some(id.to_string());
        text
    }

    fn travel(&mut self, args: &[&str]) -> String {
        let Some(direction) = args.first() else {
            return "Usage: move [direction]".to_string();
        };

        let moved = self.world.move_player(direction).map(|_| ());
        match moved {
            Ok(()) => format!(
                "You head {}...\n\n{}",
                direction.to_lowercase(),
                self.describe_location()
            ),
            Err(err) => match &err {
                MoveError::NoExit { available, .. } => {
                    format!("{err}\nAvailable directions: {}", available.join(", "))
                }
                MoveError::UnknownLocation { .. } => err.to_string(),
            },
        }
    }

    async fn save(&self, name: Option<&str>) -> String {
        let path = self.resolve_save_path(name);

        if let Err(e) = persist::backup(&path).await {
            tracing::warn!(error = %e, path = %path.display(), "backup failed");
        }
        match SavedGame::new(&self.world).save_json(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "game saved");
                format!("Game saved to {}.", path.display())
            }
            Err(e) => format!("Failed to save game: {e}"),
        }
    }

    async fn load_command(&mut self, name: Option<&str>) -> String {
        let path = self.resolve_save_path(name);
        match self.restore(&path).await {
            Ok(saved_on) => format!(
                "Game loaded from {}.\nSave from: {saved_on}\nPlayer: {} (Level {})\n\n{}",
                path.display(),
                self.world.player.name,
                self.world.player.level,
                self.describe_location()
            ),
            Err(e) => format!("Failed to load game: {e}"),
        }
    }

    /// Apply the save at `path`, returning its save date.
    async fn restore(&mut self, path: &Path) -> Result<String, SessionError> {
        let saved = SavedGame::load_json(path).await?;
        if !self.world.locations.contains_key(&saved.player.location) {
            return Err(SessionError::UnknownLocation(saved.player.location));
        }

        let saved_on = saved.metadata.save_date.clone();
        saved.apply_to(&mut self.world);
        self.conversation = None;
        tracing::info!(path = %path.display(), "game loaded");
        Ok(saved_on)
    }

    fn resolve_save_path(&self, name: Option<&str>) -> PathBuf {
        let file = match name {
            Some(name) => persist::with_json_extension(name),
            None => PathBuf::from(DEFAULT_SAVE_FILE),
        };
        self.save_dir.join(file)
    }

    fn describe_location(&self) -> String {
        let Some(location) = self.world.current_location() else {
            return "=== Unknown Location ===\nA mysterious place...".to_string();
        };

        let mut text = format!("=== {} ===\n{}\n", location.name, location.description);
        let here: Vec<&str> = self
            .world
            .npcs_at(&self.world.player.location)
            .into_iter()
            .map(|(_, npc)| npc.name.as_str())
            .collect();
        if here.is_empty() {
            text.push_str("No one else is here.");
        } else {
            text.push_str(&format!("People here: {}", here.join(", ")));
        }
        if !location.exits.is_empty() {
            let exits: Vec<&str> = location.exits.keys().map(String::as_str).collect();
            text.push_str(&format!("\nExits: {}", exits.join(", ")));
        }
        text
    }

    fn describe_inventory(&self) -> String {
        let items = &self.world.player.inventory;
        if items.is_empty() {
            return "=== Inventory ===\nYour inventory is empty.".to_string();
        }

        let mut text = "=== Inventory ===".to_string();
        for (i, item) in items.iter().enumerate() {
            text.push_str(&format!("\n{}. {}", i + 1, title_case(item)));
        }
        text
    }

    fn describe_quests(&self) -> String {
        let mut text = "=== Quest Log ===".to_string();
        let mut any = false;

        for quest in self.world.player.active_quests() {
            any = true;
            text.push_str(&format!("\n* {}", quest.name));
            if !quest.description.is_empty() {
                text.push_str(&format!("\n  {}", quest.description));
            }
            for objective in &quest.objectives {
                text.push_str(&format!("\n  - {objective}"));
            }
        }
        if !any {
            text.push_str("\nNo active quests.");
        }
        text
    }

    fn describe_status(&self) -> String {
        let player = &self.world.player;
        let location = self
            .world
            .current_location()
            .map(|l| l.name.as_str())
            .unwrap_or("Unknown");
        format!(
            "=== Player Status ===\nName: {}\nLevel: {}\nHealth: {}/100\nExperience: {}\nLocation: {}",
            player.name, player.level, player.health, player.experience, location
        )
    }

    fn describe_history(&self) -> String {
        if self.log.is_empty() {
            return "You haven't spoken with anyone yet.".to_string();
        }

        let mut text = "=== Recent Conversations ===".to_string();
        for exchange in self.log.recent(HISTORY_SHOWN) {
            text.push_str(&format!(
                "\nYou to {npc}: {said}\n{npc}: {reply}",
                npc = exchange.npc,
                said = exchange.player_said,
                reply = exchange.reply
            ));
        }
        text
    }

    async fn describe_saves(&self) -> String {
        let saves = match persist::list_saves(&self.save_dir).await {
            Ok(saves) => saves,
            Err(e) => return format!("Could not list saves: {e}"),
        };
        if saves.is_empty() {
            return "No save files found.".to_string();
        }

        let mut text = "=== Save Files ===".to_string();
        for (i, path) in saves.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match SavedGame::peek_metadata(path).await {
                Ok(meta) => {
                    text.push_str(&format!(
                        "\n{}. {name} - {} (Level {}) at {}, saved {}",
                        i + 1,
                        meta.player_name,
                        meta.player_level,
                        meta.current_location,
                        meta.save_date
                    ));
                }
                Err(_) => {
                    text.push_str(&format!(
                        "\n{}. {name} - (unable to read save info)",
                        i + 1
                    ));
                }
            }
        }
        text
    }
}

fn help_text() -> String {
    [
        "=== Available Commands ===",
        "talk to [npc name] - Start a conversation with an NPC",
        "look - Examine your current location",
        "inventory - Check your inventory",
        "quests - View your quest log",
        "status - Show your character",
        "history - Show recent conversations",
        "move [direction] - Move to another location",
        "save [file] - Save the game",
        "load [file] - Load a saved game",
        "saves - List save files",
        "help - Show this help message",
        "quit - Exit the game",
    ]
    .join("\n")
}

/// `healing_potion` -> `Healing Potion`.
fn title_case(item: &str) -> String {
    item.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("healing_potion"), "Healing Potion");
        assert_eq!(title_case("gold"), "Gold");
        assert_eq!(title_case("odd__name_"), "Odd Name");
    }

    #[test]
    fn test_help_lists_talk() {
        assert!(help_text().contains("talk to [npc name]"));
    }
}
