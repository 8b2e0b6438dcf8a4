//! QA tests for save/load and persistence functionality.
//!
//! These tests verify that game state is properly saved and restored.
//! Run with: `cargo test -p tavern-core --test qa_persistence`

use llama::testing::FakeLauncher;
use tavern_core::persist::{self, SaveMetadata};
use tavern_core::testing::fake_engine;
use tavern_core::{GameSession, GameWorld, PersistError, QuestStatus, SavedGame, TestHarness};
use tempfile::TempDir;

fn harness_in(dir: &TempDir) -> TestHarness {
    TestHarness::new(FakeLauncher::silent()).with_save_dir(dir.path())
}

// =============================================================================
// Round trip through the command loop
// =============================================================================

#[tokio::test]
async fn test_save_and_load_restores_player() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mut harness = harness_in(&dir);

    harness.input("go north").await;
    harness.session.world_mut().player.add_item("cat_treats");
    let saved = harness.input("save slot1").await;
    assert!(saved.text.starts_with("Game saved to"));
    assert!(dir.path().join("slot1.json").exists());

    harness.input("go south").await;
    assert_eq!(harness.world().player.location, "village_inn");

    let loaded = harness.input("load slot1").await;
    assert!(loaded.text.starts_with("Game loaded from"), "{}", loaded.text);
    assert!(loaded.text.contains("Player: Adventurer (Level 1)"));
    assert_eq!(harness.world().player.location, "village_center");
    assert!(harness.world().player.has_item("cat_treats"));
}

#[tokio::test]
async fn test_load_missing_file_reports_error() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mut harness = harness_in(&dir);

    let response = harness.input("load nothing_here").await;
    assert!(response.text.starts_with("Failed to load game:"));
    assert_eq!(harness.world().player.location, "village_inn");
}

#[tokio::test]
async fn test_overwrite_creates_backup() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mut harness = harness_in(&dir);

    harness.input("save").await;
    harness.input("save").await;

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    assert_eq!(names.len(), 2, "{names:?}");
    assert_eq!(names[0], "savegame.json");
    assert!(names[1].starts_with("savegame.json.backup_"));
}

#[tokio::test]
async fn test_saves_command_lists_metadata() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mut harness = harness_in(&dir);

    assert_eq!(harness.input("saves").await.text, "No save files found.");

    harness.input("save my_game").await;
    std::fs::write(dir.path().join("notes.json"), "{}").unwrap();

    let listing = harness.input("saves").await.text;
    assert!(listing.contains("1. my_game.json - Adventurer (Level 1) at village_inn"));
    assert!(!listing.contains("notes.json"));
}

// =============================================================================
// File format
// =============================================================================

#[tokio::test]
async fn test_saved_game_file_round_trip() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("quest_save.json");

    let mut world = GameWorld::village();
    world
        .player
        .update_quest_status("find_missing_cat", QuestStatus::Completed);
    let saved = SavedGame::new(&world);
    saved.save_json(&path).await.expect("Failed to save");

    let loaded = SavedGame::load_json(&path).await.expect("Failed to load");
    assert_eq!(loaded, saved);
    assert_eq!(loaded.metadata.active_quests, 0);

    let meta: SaveMetadata = SavedGame::peek_metadata(&path).await.expect("Failed to peek");
    assert_eq!(meta.player_name, "Adventurer");
}

#[tokio::test]
async fn test_version_mismatch_rejected() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("old_save.json");

    let mut saved = SavedGame::new(&GameWorld::village());
    saved.version = 99;
    saved.save_json(&path).await.unwrap();

    assert!(matches!(
        SavedGame::load_json(&path).await,
        Err(PersistError::VersionMismatch { expected: 1, found: 99 })
    ));
}

#[tokio::test]
async fn test_corrupt_json_rejected() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("broken_save.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        SavedGame::load_json(&path).await,
        Err(PersistError::Json(_))
    ));
}

#[tokio::test]
async fn test_session_load_rejects_unknown_location() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("lost_save.json");

    let mut world = GameWorld::village();
    world.player.location = "the_moon".to_string();
    SavedGame::new(&world).save_json(&path).await.unwrap();

    let launcher = FakeLauncher::silent();
    let result = GameSession::load(&path, fake_engine(&launcher)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_backup_of_missing_file_is_noop() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let backup = persist::backup(dir.path().join("savegame.json")).await.unwrap();
    assert!(backup.is_none());
}

#[tokio::test]
async fn test_rapid_backups_keep_every_copy() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("savegame.json");

    tokio::fs::write(&path, "first").await.unwrap();
    let first = persist::backup(&path).await.unwrap().unwrap();
    tokio::fs::write(&path, "second").await.unwrap();
    let second = persist::backup(&path).await.unwrap().unwrap();

    assert_ne!(first, second);
    assert_eq!(tokio::fs::read_to_string(&first).await.unwrap(), "first");
    assert_eq!(tokio::fs::read_to_string(&second).await.unwrap(), "second");
}
