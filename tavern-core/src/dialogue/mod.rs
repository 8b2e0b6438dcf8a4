//! NPC dialogue.
//!
//! Contains prompt assembly, the worker-backed dialogue engine, and the
//! conversation log shown to the player.

mod engine;
pub mod prompt;

pub use engine::{fallback, DialogueEngine};

use crate::world::{Npc, Player};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Everything needed to voice one NPC reply.
#[derive(Debug, Clone, Copy)]
pub struct DialogueRequest<'a> {
    /// The NPC being spoken to.
    pub npc: &'a Npc,

    /// The player, when their situation should inform the reply.
    pub player: Option<&'a Player>,

    /// What the player just said.
    pub utterance: &'a str,
}

impl<'a> DialogueRequest<'a> {
    pub fn new(npc: &'a Npc, utterance: &'a str) -> Self {
        Self {
            npc,
            player: None,
            utterance,
        }
    }

    pub fn with_player(mut self, player: &'a Player) -> Self {
        self.player = Some(player);
        self
    }
}

/// One line of conversation and the reply it got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub npc: String,
    pub player_said: String,
    pub reply: String,
}

/// Oldest entries are dropped past this many exchanges.
const MAX_HISTORY: usize = 100;

/// Conversation history, most recent last.
#[derive(Debug, Clone, Default)]
pub struct DialogueLog {
    exchanges: VecDeque<Exchange>,
}

impl DialogueLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        npc: impl Into<String>,
        player_said: impl Into<String>,
        reply: impl Into<String>,
    ) {
        if self.exchanges.len() == MAX_HISTORY {
            self.exchanges.pop_front();
        }
        self.exchanges.push_back(Exchange {
            npc: npc.into(),
            player_said: player_said.into(),
            reply: reply.into(),
        });
    }

    /// The last `n` exchanges, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter().skip(self.exchanges.len().saturating_sub(n))
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut log = DialogueLog::new();
        for i in 0..5 {
            log.record("Martha", format!("line {i}"), "...");
        }

        let said: Vec<&str> = log.recent(2).map(|e| e.player_said.as_str()).collect();
        assert_eq!(said, vec!["line 3", "line 4"]);
        assert_eq!(log.recent(10).count(), 5);
    }

    #[test]
    fn test_log_is_bounded() {
        let mut log = DialogueLog::new();
        for i in 0..(MAX_HISTORY + 3) {
            log.record("Gareth", i.to_string(), "Hm.");
        }
        assert_eq!(log.len(), MAX_HISTORY);
        assert_eq!(log.recent(MAX_HISTORY).next().unwrap().player_said, "3");
    }
}
