//! Storage traits
//!
//! `BoardStore` is the contract the draft coordinator writes through. It is
//! implemented by [`SlotStore`](super::SlotStore) over either a plain
//! connection or an open transaction.

use crate::error::Result;
use crate::models::{PlayerId, Slot, SlotId};

/// Durable slot -> player mapping
pub trait BoardStore {
    /// Set (or clear, with `None`) the player assigned to a slot.
    /// Fails with `SlotNotFound` when the slot does not exist.
    fn assign(&self, slot_id: &SlotId, player_id: Option<PlayerId>) -> Result<()>;

    /// Clear the given slots in a single statement, returning rows touched
    fn bulk_clear(&self, slot_ids: &[SlotId]) -> Result<usize>;

    /// Clear every slot currently holding the player
    fn clear_where_player(&self, player_id: PlayerId) -> Result<usize>;

    /// All slots ordered by round, then pick in round
    fn read_all(&self) -> Result<Vec<Slot>>;

    /// The assigned slot written most recently. Ties on revision fall back
    /// to slot id ascending.
    fn most_recent_assigned(&self) -> Result<Option<Slot>>;

    /// A slot other than `except` that currently holds the player
    fn assigned_elsewhere(&self, player_id: PlayerId, except: &SlotId) -> Result<Option<SlotId>>;
}
