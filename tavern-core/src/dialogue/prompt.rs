//! Prompt assembly for NPC dialogue.
//!
//! The instruction block has a fixed shape the worker's output quality
//! depends on: character sheet, situation, optional player context,
//! roleplay rules, then the quoted player line and the closing cue.

use super::DialogueRequest;

const DEFAULT_DIALOGUE_STYLE: &str = "speaks naturally";
const DEFAULT_BACKSTORY: &str = "A mysterious figure with an unknown past";
const DEFAULT_MOOD: &str = "neutral";

/// Build the worker prompt for one dialogue turn.
pub fn build(request: &DialogueRequest<'_>) -> String {
    let npc = request.npc;
    let name = npc.name.as_str();

    format!(
        "You are {name}, a character in a fantasy RPG game.\n\
         \n\
         CHARACTER BACKGROUND:\n\
         - Personality: {personality}\n\
         - Dialogue Style: {style}\n\
         - Backstory: {backstory}\n\
         \n\
         CURRENT SITUATION:\n\
         - You are currently at {location}\n\
         - You are feeling {mood} today\n\
         - You are knowledgeable about: {knowledge}\n\
         {player_context}\n\
         \n\
         ROLEPLAY INSTRUCTIONS:\n\
         - Stay completely in character as {name}\n\
         - Respond naturally to what the player says\n\
         - Use your personality and dialogue style\n\
         - Draw from your knowledge areas when relevant\n\
         - Keep responses conversational and engaging (1-3 sentences typically)\n\
         - Don't break character or mention that you're an AI\n\
         - If the player asks about something outside your knowledge, respond as your character would\n\
         - React appropriately to the player's tone and content\n\
         \n\
         The player just said to you: \"{utterance}\"\n\
         \n\
         Respond as {name} would:",
        personality = npc.personality,
        style = npc.dialogue_style.as_deref().unwrap_or(DEFAULT_DIALOGUE_STYLE),
        backstory = npc.backstory.as_deref().unwrap_or(DEFAULT_BACKSTORY),
        location = npc.location,
        mood = npc.current_mood.as_deref().unwrap_or(DEFAULT_MOOD),
        knowledge = npc.knowledge.join(", "),
        player_context = player_context(request),
        utterance = request.utterance,
    )
}

/// The player-context line, or an empty string without a player.
fn player_context(request: &DialogueRequest<'_>) -> String {
    let Some(player) = request.player else {
        return String::new();
    };

    let mut context = format!(
        "\nThe player you're talking to is named {} and is currently at {}.",
        player.name, player.location
    );

    let active: Vec<&str> = player.active_quests().map(|q| q.name.as_str()).collect();
    if !active.is_empty() {
        context.push_str(&format!(" They have active quests: {}.", active.join(", ")));
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Npc, Player, Quest, QuestStatus};

    fn martha() -> Npc {
        Npc::new("Martha", "warm, welcoming", "village_inn")
            .with_knowledge(["local_gossip", "missing_cat_quest"])
            .with_mood("worried")
    }

    #[test]
    fn test_build_is_deterministic() {
        let npc = martha();
        let player = Player::new("Rook", "village_inn");
        let request = DialogueRequest::new(&npc, "Hello").with_player(&player);
        assert_eq!(build(&request), build(&request));
    }

    #[test]
    fn test_character_sheet_and_situation() {
        let npc = martha();
        let prompt = build(&DialogueRequest::new(&npc, "Have you seen my cat?"));

        assert!(prompt.starts_with("You are Martha, a character in a fantasy RPG game.\n"));
        assert!(prompt.contains("- Personality: warm, welcoming\n"));
        assert!(prompt.contains("- You are currently at village_inn\n"));
        assert!(prompt.contains("- You are feeling worried today\n"));
        assert!(prompt.contains("- You are knowledgeable about: local_gossip, missing_cat_quest\n"));
        assert!(prompt.contains("The player just said to you: \"Have you seen my cat?\""));
        assert!(prompt.ends_with("Respond as Martha would:"));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let npc = Npc::new("Stranger", "quiet", "crossroads");
        let prompt = build(&DialogueRequest::new(&npc, "Hi"));

        assert!(prompt.contains("- Dialogue Style: speaks naturally\n"));
        assert!(prompt.contains("- Backstory: A mysterious figure with an unknown past\n"));
        assert!(prompt.contains("- You are feeling neutral today\n"));
    }

    #[test]
    fn test_player_region_omitted_without_player() {
        let npc = martha();
        let prompt = build(&DialogueRequest::new(&npc, "Hi"));

        assert!(!prompt.contains("The player you're talking to"));
        assert!(prompt.contains("missing_cat_quest\n\n\nROLEPLAY INSTRUCTIONS:\n"));
    }

    #[test]
    fn test_player_region_with_active_quests() {
        let npc = martha();
        let mut player = Player::new("Rook", "village_inn");
        player.add_quest(Quest::new("cat", "Find the Missing Cat"));
        player.add_quest(Quest::new("bread", "Fetch Bread").with_status(QuestStatus::Completed));
        player.add_quest(Quest::new("well", "Fix the Well"));

        let prompt = build(&DialogueRequest::new(&npc, "Hi").with_player(&player));

        assert!(prompt.contains(
            "missing_cat_quest\n\nThe player you're talking to is named Rook and is currently \
             at village_inn. They have active quests: Find the Missing Cat, Fix the Well.\n\n\
             ROLEPLAY INSTRUCTIONS:\n"
        ));
        assert!(!prompt.contains("Fetch Bread"));
    }

    #[test]
    fn test_quest_clause_omitted_without_active_quests() {
        let npc = martha();
        let mut player = Player::new("Rook", "forest_path");
        player.add_quest(Quest::new("bread", "Fetch Bread").with_status(QuestStatus::Completed));

        let prompt = build(&DialogueRequest::new(&npc, "Hi").with_player(&player));

        assert!(prompt.contains("is named Rook and is currently at forest_path.\n"));
        assert!(!prompt.contains("They have active quests"));
    }

    #[test]
    fn test_utterance_is_embedded_verbatim() {
        let npc = martha();
        let prompt = build(&DialogueRequest::new(&npc, "Is it \"safe\"\nout there?"));
        assert!(prompt.contains("The player just said to you: \"Is it \"safe\"\nout there?\""));
    }
}
