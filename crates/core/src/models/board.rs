//! Board snapshot - derived view of all assigned slots

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Player, SlotId};

/// Mapping of slot id to drafted player. Only assigned slots appear.
///
/// Entries keep the order they were read in (round, then pick-in-round), and
/// serialize as a JSON object in that same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardSnapshot(Vec<(SlotId, Player)>);

impl BoardSnapshot {
    pub fn get(&self, slot_id: &SlotId) -> Option<&Player> {
        self.0
            .iter()
            .find(|(slot, _)| slot == slot_id)
            .map(|(_, player)| player)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlotId, &Player)> {
        self.0.iter().map(|(slot, player)| (slot, player))
    }

    /// Slot currently holding the given player, if any
    pub fn slot_of(&self, player_id: i64) -> Option<&SlotId> {
        self.0
            .iter()
            .find(|(_, player)| player.id == player_id)
            .map(|(slot, _)| slot)
    }
}

impl FromIterator<(SlotId, Player)> for BoardSnapshot {
    fn from_iter<I: IntoIterator<Item = (SlotId, Player)>>(iter: I) -> Self {
        let mut entries: Vec<(SlotId, Player)> = Vec::new();
        for (slot, player) in iter {
            match entries.iter_mut().find(|(existing, _)| *existing == slot) {
                Some(entry) => entry.1 = player,
                None => entries.push((slot, player)),
            }
        }
        Self(entries)
    }
}

impl Serialize for BoardSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (slot, player) in &self.0 {
            map.serialize_entry(slot, player)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BoardSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> Visitor<'de> for SnapshotVisitor {
            type Value = BoardSnapshot;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of slot id to player")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<SlotId, Player>()? {
                    entries.push(entry);
                }
                Ok(entries.into_iter().collect())
            }
        }

        deserializer.deserialize_map(SnapshotVisitor)
    }
}
