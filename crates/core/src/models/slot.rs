//! Slot model - one (owner, round) cell of the draft grid

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PlayerId;

/// Composite slot identity rendered as `"{owner_id}-R{round}"`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    pub fn new(owner_id: &str, round: u32) -> Self {
        Self(format!("{}-R{}", owner_id, round))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Owner part of the id (everything before the first `-`)
    pub fn owner_id(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }

    /// Round parsed from the `R{n}` suffix, if the id is well formed
    pub fn round(&self) -> Option<u32> {
        let (_, suffix) = self.0.split_once("-R")?;
        suffix.parse().ok()
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SlotId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SlotId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A persisted draft slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub owner_id: String,
    pub round: u32,
    pub pick_in_round: u32,
    pub player_id: Option<PlayerId>,
    pub modified_at: DateTime<Utc>,
    /// Board revision of the last write that touched this slot
    pub revision: u64,
}

impl Slot {
    pub fn is_assigned(&self) -> bool {
        self.player_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_id_parts() {
        let id = SlotId::new("T12", 17);
        assert_eq!(id.as_str(), "T12-R17");
        assert_eq!(id.owner_id(), "T12");
        assert_eq!(id.round(), Some(17));
    }

    #[test]
    fn test_malformed_slot_id() {
        let id = SlotId::from("garbage");
        assert_eq!(id.owner_id(), "garbage");
        assert_eq!(id.round(), None);
    }
}
