//! Owner model - a participating team

use serde::{Deserialize, Serialize};

/// A team in the draft. Only the display name changes after seeding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub name: String,
    pub draft_position: u32,
}

impl Owner {
    /// Seeded owner for the given 1-based draft position
    pub fn seeded(draft_position: u32) -> Self {
        Self {
            id: format!("T{}", draft_position),
            name: format!("Team {}", draft_position),
            draft_position,
        }
    }
}

/// Grid dimensions of the draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLayout {
    pub owners: u32,
    pub rounds: u32,
}

impl DraftLayout {
    pub fn slot_count(&self) -> u32 {
        self.owners * self.rounds
    }
}
