//! Game world state: the player, NPCs, and the location graph.
//!
//! Everything here is plain data plus small bookkeeping helpers. The
//! dialogue layer only ever reads these records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from moving the player around the map.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("You can't go {direction} from here.")]
    NoExit {
        direction: String,
        available: Vec<String>,
    },

    #[error("The way {direction} leads nowhere ({target}).")]
    UnknownLocation { direction: String, target: String },
}

/// Status of a quest in the player's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    Active,
    Completed,
    Failed,
}

/// A quest in the player's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: QuestStatus,
    #[serde(default)]
    pub objectives: Vec<String>,
}

impl Quest {
    /// Create an active quest with no objectives.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            status: QuestStatus::Active,
            objectives: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objectives.push(objective.into());
        self
    }

    pub fn with_status(mut self, status: QuestStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == QuestStatus::Active
    }
}

/// The player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    /// Id of the location the player is standing in.
    pub location: String,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub quests: Vec<Quest>,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default = "default_health")]
    pub health: u32,
    #[serde(default)]
    pub experience: u32,
}

fn default_level() -> u32 {
    1
}

fn default_health() -> u32 {
    100
}

impl Player {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            inventory: Vec::new(),
            quests: Vec::new(),
            level: default_level(),
            health: default_health(),
            experience: 0,
        }
    }

    pub fn add_item(&mut self, item: impl Into<String>) {
        self.inventory.push(item.into());
    }

    /// Remove one copy of `item`. Returns false if the player had none.
    pub fn remove_item(&mut self, item: &str) -> bool {
        match self.inventory.iter().position(|i| i == item) {
            Some(index) => {
                self.inventory.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn has_item(&self, item: &str) -> bool {
        self.inventory.iter().any(|i| i == item)
    }

    pub fn add_quest(&mut self, quest: Quest) {
        self.quests.push(quest);
    }

    /// Set the status of the quest with `id`. Returns false if there is no such quest.
    pub fn update_quest_status(&mut self, id: &str, status: QuestStatus) -> bool {
        match self.quests.iter_mut().find(|q| q.id == id) {
            Some(quest) => {
                quest.status = status;
                true
            }
            None => false,
        }
    }

    /// Quests currently marked active, in log order.
    pub fn active_quests(&self) -> impl Iterator<Item = &Quest> {
        self.quests.iter().filter(|q| q.is_active())
    }
}

/// A non-player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    /// Display name.
    pub name: String,
    pub personality: String,
    /// Id of the location the NPC is found at.
    pub location: String,
    /// Knowledge-area tags, in order.
    #[serde(default)]
    pub knowledge: Vec<String>,
    #[serde(default)]
    pub dialogue_style: Option<String>,
    #[serde(default)]
    pub backstory: Option<String>,
    #[serde(default)]
    pub current_mood: Option<String>,
    #[serde(default)]
    pub special_items: Vec<String>,
}

impl Npc {
    pub fn new(
        name: impl Into<String>,
        personality: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            personality: personality.into(),
            location: location.into(),
            knowledge: Vec::new(),
            dialogue_style: None,
            backstory: None,
            current_mood: None,
            special_items: Vec::new(),
        }
    }

    pub fn with_knowledge<I, S>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.knowledge = areas.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dialogue_style(mut self, style: impl Into<String>) -> Self {
        self.dialogue_style = Some(style.into());
        self
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = Some(backstory.into());
        self
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.current_mood = Some(mood.into());
        self
    }

    pub fn with_special_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.special_items = items.into_iter().map(Into::into).collect();
        self
    }
}

/// A place the player can stand in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub description: String,
    /// Ids of NPCs found here.
    #[serde(default)]
    pub npcs: Vec<String>,
    /// Direction to destination location id.
    #[serde(default)]
    pub exits: BTreeMap<String, String>,
}

impl Location {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            npcs: Vec::new(),
            exits: BTreeMap::new(),
        }
    }

    pub fn with_npc(mut self, npc_id: impl Into<String>) -> Self {
        self.npcs.push(npc_id.into());
        self
    }

    pub fn with_exit(mut self, direction: impl Into<String>, target: impl Into<String>) -> Self {
        self.exits.insert(direction.into(), target.into());
        self
    }
}

/// The complete game world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameWorld {
    pub player: Player,
    pub npcs: BTreeMap<String, Npc>,
    pub locations: BTreeMap<String, Location>,
}

impl GameWorld {
    pub fn new(player: Player) -> Self {
        Self {
            player,
            npcs: BTreeMap::new(),
            locations: BTreeMap::new(),
        }
    }

    pub fn with_npc(mut self, id: impl Into<String>, npc: Npc) -> Self {
        self.npcs.insert(id.into(), npc);
        self
    }

    pub fn with_location(mut self, id: impl Into<String>, location: Location) -> Self {
        self.locations.insert(id.into(), location);
        self
    }

    /// The location the player is standing in, if it exists.
    pub fn current_location(&self) -> Option<&Location> {
        self.locations.get(&self.player.location)
    }

    /// NPCs listed at `location_id`, in the order the location lists them.
    pub fn npcs_at(&self, location_id: &str) -> Vec<(&str, &Npc)> {
        let Some(location) = self.locations.get(location_id) else {
            return Vec::new();
        };
        location
            .npcs
            .iter()
            .filter_map(|id| self.npcs.get_key_value(id))
            .map(|(id, npc)| (id.as_str(), npc))
            .collect()
    }

    /// Find an NPC by display name or id, ignoring case and surrounding space.
    pub fn find_npc(&self, name: &str) -> Option<(&str, &Npc)> {
        let wanted = name.trim().to_lowercase();
        self.npcs
            .iter()
            .find(|(id, npc)| npc.name.to_lowercase() == wanted || id.as_str() == wanted)
            .map(|(id, npc)| (id.as_str(), npc))
    }

    /// Whether the NPC with `npc_id` is at the player's location.
    pub fn is_npc_here(&self, npc_id: &str) -> bool {
        self.current_location()
            .is_some_and(|location| location.npcs.iter().any(|id| id == npc_id))
    }

    /// Follow the exit in `direction` from the player's location.
    pub fn move_player(&mut self, direction: &str) -> Result<&Location, MoveError> {
        let direction = direction.trim().to_lowercase();
        let exits = self
            .current_location()
            .map(|location| location.exits.clone())
            .unwrap_or_default();

        let Some(target) = exits.get(&direction) else {
            return Err(MoveError::NoExit {
                direction,
                available: exits.keys().cloned().collect(),
            });
        };
        if !self.locations.contains_key(target) {
            return Err(MoveError::UnknownLocation {
                direction,
                target: target.clone(),
            });
        }

        self.player.location = target.clone();
        self.locations
            .get(target)
            .ok_or_else(|| MoveError::UnknownLocation {
                direction,
                target: target.clone(),
            })
    }

    /// The starting village: an inn, the square, a forge, and a forest trail.
    pub fn village() -> Self {
        let mut player = Player::new("Adventurer", "village_inn");
        for item in ["rusty_sword", "healing_potion", "gold_coins"] {
            player.add_item(item);
        }
        player.add_quest(
            Quest::new("find_missing_cat", "Find the Missing Cat")
                .with_description("Help the innkeeper find their lost cat, Whiskers")
                .with_objective("Search the forest")
                .with_objective("Ask villagers about the cat"),
        );

        Self::new(player)
            .with_npc(
                "innkeeper",
                Npc::new(
                    "Martha",
                    "warm, welcoming, slightly worried about her missing cat",
                    "village_inn",
                )
                .with_knowledge([
                    "local_gossip",
                    "village_history",
                    "travelers_tales",
                    "missing_cat_quest",
                    "inn_services",
                    "local_dangers",
                ])
                .with_dialogue_style("friendly and motherly, speaks with concern about her cat")
                .with_backstory("Has run the village inn for 20 years, knows everyone in town")
                .with_mood("worried")
                .with_special_items(["room_key", "cat_treats"]),
            )
            .with_npc(
                "blacksmith",
                Npc::new(
                    "Gareth",
                    "gruff but helpful, takes pride in his craft",
                    "blacksmith_shop",
                )
                .with_knowledge([
                    "weapon_crafting",
                    "armor_repair",
                    "metal_working",
                    "local_ores",
                    "ancient_weapons",
                    "combat_techniques",
                ])
                .with_dialogue_style("direct and practical, speaks in short sentences")
                .with_backstory("Former adventurer turned blacksmith, has seen many battles")
                .with_mood("busy")
                .with_special_items(["masterwork_hammer", "rare_metals"]),
            )
            .with_npc(
                "village_elder",
                Npc::new(
                    "Elder Aldric",
                    "wise, patient, speaks in riddles and metaphors",
                    "village_center",
                )
                .with_knowledge([
                    "ancient_history",
                    "magic_lore",
                    "prophecies",
                    "village_founding",
                    "spiritual_guidance",
                    "hidden_secrets",
                ])
                .with_dialogue_style("speaks slowly and thoughtfully, often in proverbs")
                .with_backstory(
                    "Has guided the village for over 50 years, keeper of ancient knowledge",
                )
                .with_mood("contemplative")
                .with_special_items(["ancient_tome", "crystal_pendant"]),
            )
            .with_location(
                "village_inn",
                Location::new(
                    "The Prancing Pony Inn",
                    "A cozy inn with warm firelight and the smell of fresh bread",
                )
                .with_npc("innkeeper")
                .with_exit("north", "village_center")
                .with_exit("east", "blacksmith_shop"),
            )
            .with_location(
                "village_center",
                Location::new(
                    "Village Square",
                    "The heart of the village with a stone fountain and market stalls",
                )
                .with_npc("village_elder")
                .with_exit("south", "village_inn")
                .with_exit("west", "forest_path")
                .with_exit("east", "blacksmith_shop"),
            )
            .with_location(
                "blacksmith_shop",
                Location::new(
                    "Gareth's Forge",
                    "A hot, smoky workshop filled with the sound of hammer on anvil",
                )
                .with_npc("blacksmith")
                .with_exit("west", "village_center")
                .with_exit("south", "village_inn"),
            )
            .with_location(
                "forest_path",
                Location::new(
                    "Forest Trail",
                    "A winding path through tall trees with dappled sunlight",
                )
                .with_exit("east", "village_center"),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_village_starts_at_inn() {
        let world = GameWorld::village();
        let location = world.current_location().unwrap();
        assert_eq!(location.name, "The Prancing Pony Inn");

        let here: Vec<&str> = world.npcs_at("village_inn").iter().map(|(id, _)| *id).collect();
        assert_eq!(here, vec!["innkeeper"]);
    }

    #[test]
    fn test_find_npc_by_name_or_id() {
        let world = GameWorld::village();
        assert_eq!(world.find_npc("  martha ").map(|(id, _)| id), Some("innkeeper"));
        assert_eq!(world.find_npc("ELDER ALDRIC").map(|(id, _)| id), Some("village_elder"));
        assert_eq!(world.find_npc("blacksmith").map(|(_, n)| n.name.as_str()), Some("Gareth"));
        assert!(world.find_npc("nobody").is_none());
    }

    #[test]
    fn test_move_player() {
        let mut world = GameWorld::village();
        let location = world.move_player("North").unwrap();
        assert_eq!(location.name, "Village Square");
        assert_eq!(world.player.location, "village_center");
        assert!(world.is_npc_here("village_elder"));
        assert!(!world.is_npc_here("innkeeper"));
    }

    #[test]
    fn test_move_without_exit() {
        let mut world = GameWorld::village();
        let err = world.move_player("up").unwrap_err();
        assert_eq!(
            err,
            MoveError::NoExit {
                direction: "up".to_string(),
                available: vec!["east".to_string(), "north".to_string()],
            }
        );
        assert_eq!(world.player.location, "village_inn");
    }

    #[test]
    fn test_move_to_missing_location() {
        let mut world = GameWorld::new(Player::new("Rook", "cell"))
            .with_location("cell", Location::new("Cell", "Damp.").with_exit("out", "void"));
        assert!(matches!(
            world.move_player("out"),
            Err(MoveError::UnknownLocation { .. })
        ));
        assert_eq!(world.player.location, "cell");
    }

    #[test]
    fn test_inventory_bookkeeping() {
        let mut player = Player::new("Rook", "cell");
        player.add_item("lockpick");
        player.add_item("lockpick");
        assert!(player.has_item("lockpick"));
        assert!(player.remove_item("lockpick"));
        assert!(player.has_item("lockpick"));
        assert!(player.remove_item("lockpick"));
        assert!(!player.remove_item("lockpick"));
    }

    #[test]
    fn test_quest_status_updates() {
        let mut world = GameWorld::village();
        assert_eq!(world.player.active_quests().count(), 1);
        assert!(world
            .player
            .update_quest_status("find_missing_cat", QuestStatus::Completed));
        assert_eq!(world.player.active_quests().count(), 0);
        assert!(!world.player.update_quest_status("slay_dragon", QuestStatus::Failed));
    }

    #[test]
    fn test_quest_status_serializes_lowercase() {
        let json = serde_json::to_string(&QuestStatus::Active).unwrap();
        assert_eq!(json, "\"active\"");
    }
}
