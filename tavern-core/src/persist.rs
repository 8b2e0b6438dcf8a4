//! Save/load of game state as JSON.
//!
//! A save holds the player and every NPC record plus a small metadata block
//! that can be read without loading the whole file.

use crate::world::{GameWorld, Npc, Player};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid save: {0}")]
    Invalid(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// Default save file name.
pub const DEFAULT_SAVE_FILE: &str = "savegame.json";

/// A saved game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGame {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created (RFC 3339).
    pub saved_at: String,

    pub player: Player,

    /// NPC records by id.
    pub npcs: BTreeMap<String, Npc>,

    pub metadata: SaveMetadata,
}

/// Summary shown when listing saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub save_date: String,
    pub player_name: String,
    pub player_level: u32,
    pub current_location: String,
    pub inventory_count: usize,
    pub active_quests: usize,
}

impl SavedGame {
    /// Snapshot the world.
    pub fn new(world: &GameWorld) -> Self {
        let now = Local::now();
        let player = world.player.clone();
        let metadata = SaveMetadata {
            save_date: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            player_name: player.name.clone(),
            player_level: player.level,
            current_location: player.location.clone(),
            inventory_count: player.inventory.len(),
            active_quests: player.active_quests().count(),
        };

        Self {
            version: SAVE_VERSION,
            saved_at: now.to_rfc3339(),
            player,
            npcs: world.npcs.clone(),
            metadata,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load and validate a JSON save.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;
        saved.validate()?;
        Ok(saved)
    }

    /// Read just the metadata block of a save.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        if partial.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }
        Ok(partial.metadata)
    }

    fn validate(&self) -> Result<(), PersistError> {
        if self.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: self.version,
            });
        }
        if self.player.name.trim().is_empty() {
            return Err(PersistError::Invalid("player has no name".to_string()));
        }
        if self.player.location.trim().is_empty() {
            return Err(PersistError::Invalid("player has no location".to_string()));
        }
        Ok(())
    }

    /// Replace the world's player and refresh NPCs it already knows about.
    pub fn apply_to(self, world: &mut GameWorld) {
        world.player = self.player;
        for (id, npc) in self.npcs {
            if let Some(existing) = world.npcs.get_mut(&id) {
                *existing = npc;
            }
        }
    }
}

/// Append `.json` unless the name already ends with it.
pub fn with_json_extension(name: &str) -> PathBuf {
    if name.ends_with(".json") {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{name}.json"))
    }
}

/// Copy an existing save aside as `<file>.backup_<timestamp>`.
///
/// Earlier backups are never overwritten.
///
/// Returns the backup path, or `None` when there was nothing to back up.
pub async fn backup(path: impl AsRef<Path>) -> Result<Option<PathBuf>, PersistError> {
    let path = path.as_ref();
    if !fs::try_exists(path).await? {
        return Ok(None);
    }

    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = unused_backup_path(path, &stamp).await?;

    fs::copy(path, &backup_path).await?;
    tracing::info!(from = %path.display(), to = %backup_path.display(), "save backed up");
    Ok(Some(backup_path))
}

/// `<file>.backup_<stamp>`, or `<file>.backup_<stamp>_<n>` if that is taken.
async fn unused_backup_path(path: &Path, stamp: &str) -> Result<PathBuf, PersistError> {
    let mut suffix = format!(".backup_{stamp}");
    let mut n = 1;
    loop {
        let mut name = path.as_os_str().to_owned();
        name.push(&suffix);
        let candidate = PathBuf::from(name);
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        suffix = format!(".backup_{stamp}_{n}");
        n += 1;
    }
}

/// JSON files in `dir` that look like saves, sorted by name.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, PersistError> {
    let mut entries = fs::read_dir(dir).await?;
    let mut saves = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let lower = name.to_lowercase();
        if lower.ends_with(".json") && (lower.contains("save") || lower.contains("game")) {
            saves.push(path);
        }
    }

    saves.sort();
    Ok(saves)
}
