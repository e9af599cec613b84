//! Player model - a draftable entity

use serde::{Deserialize, Serialize};

pub type PlayerId = i64;

/// A draftable player. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Roster position (QB, RB, WR, ...)
    pub position: String,
    /// Professional team abbreviation
    pub team: Option<String>,
    /// Week the player's team does not play
    pub bye_week: Option<u32>,
}

/// Player data before it has been assigned an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlayer {
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub bye_week: Option<u32>,
}

impl NewPlayer {
    pub fn new(name: impl Into<String>, position: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: position.into(),
            team: None,
            bye_week: None,
        }
    }

    pub fn with_team(mut self, team: impl Into<String>, bye_week: u32) -> Self {
        self.team = Some(team.into());
        self.bye_week = Some(bye_week);
        self
    }
}
