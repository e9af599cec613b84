//! Slot storage operations

use chrono::Utc;
use rusqlite::{params, Connection, ToSql};
use tracing::instrument;

use super::parse::{player_from_row, slot_from_row, OptionalExt, SLOT_COLUMNS};
use super::traits::BoardStore;
use crate::error::{Error, Result};
use crate::models::{BoardSnapshot, Owner, PlayerId, Slot, SlotId};

pub struct SlotStore<'a> {
    conn: &'a Connection,
}

impl<'a> SlotStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Advance the board revision counter and return the new value
    fn next_revision(&self) -> Result<u64> {
        let revision = self.conn.query_row(
            "UPDATE board_revision SET value = value + 1 WHERE id = 1 RETURNING value",
            [],
            |row| row.get(0),
        )?;
        Ok(revision)
    }

    /// Create the full owners x rounds grid, all unassigned
    #[instrument(skip(self, owners), fields(owners = owners.len()))]
    pub fn create_grid(&self, owners: &[Owner], rounds: u32) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let mut stmt = self.conn.prepare(
            "INSERT INTO slots (slot_id, owner_id, round, pick_in_round, player_id, modified_at, revision)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, 0)",
        )?;

        let mut created = 0;
        for round in 1..=rounds {
            for owner in owners {
                stmt.execute(params![
                    SlotId::new(&owner.id, round).as_str(),
                    owner.id,
                    round,
                    owner.draft_position,
                    now,
                ])?;
                created += 1;
            }
        }
        Ok(created)
    }

    /// Find a slot by id
    #[instrument(skip(self))]
    pub fn find(&self, slot_id: &SlotId) -> Result<Option<Slot>> {
        let slot = self
            .conn
            .query_row(
                &format!("SELECT {} FROM slots WHERE slot_id = ?1", SLOT_COLUMNS),
                params![slot_id.as_str()],
                slot_from_row,
            )
            .optional()?;
        Ok(slot)
    }

    /// Clear every slot on the board
    #[instrument(skip(self))]
    pub fn clear_all(&self) -> Result<usize> {
        let revision = self.next_revision()?;
        let cleared = self.conn.execute(
            "UPDATE slots SET player_id = NULL, modified_at = ?1, revision = ?2
             WHERE player_id IS NOT NULL",
            params![Utc::now().to_rfc3339(), revision],
        )?;
        Ok(cleared)
    }

    /// Number of assigned slots
    pub fn count_assigned(&self) -> Result<u64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM slots WHERE player_id IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Derive the board snapshot from the assigned slots
    #[instrument(skip(self))]
    pub fn snapshot(&self) -> Result<BoardSnapshot> {
        let mut stmt = self.conn.prepare(
            "SELECT s.slot_id, p.id, p.name, p.position, p.team, p.bye_week
             FROM slots s
             INNER JOIN players p ON p.id = s.player_id
             ORDER BY s.round, s.pick_in_round",
        )?;

        let entries = stmt
            .query_map([], |row| {
                Ok((
                    SlotId::from(row.get::<_, String>(0)?),
                    player_from_row(row, 1)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries.into_iter().collect())
    }
}

impl BoardStore for SlotStore<'_> {
    #[instrument(skip(self))]
    fn assign(&self, slot_id: &SlotId, player_id: Option<PlayerId>) -> Result<()> {
        let revision = self.next_revision()?;
        let updated = self.conn.execute(
            "UPDATE slots SET player_id = ?1, modified_at = ?2, revision = ?3 WHERE slot_id = ?4",
            params![player_id, Utc::now().to_rfc3339(), revision, slot_id.as_str()],
        )?;
        if updated == 0 {
            return Err(Error::SlotNotFound(slot_id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self, slot_ids), fields(count = slot_ids.len()))]
    fn bulk_clear(&self, slot_ids: &[SlotId]) -> Result<usize> {
        if slot_ids.is_empty() {
            return Ok(0);
        }

        let revision = self.next_revision()?;
        let placeholders = vec!["?"; slot_ids.len()].join(", ");
        let sql = format!(
            "UPDATE slots SET player_id = NULL, modified_at = ?, revision = ?
             WHERE slot_id IN ({})",
            placeholders
        );

        let now = Utc::now().to_rfc3339();
        let ids: Vec<&str> = slot_ids.iter().map(SlotId::as_str).collect();
        let mut values: Vec<&dyn ToSql> = vec![&now as &dyn ToSql, &revision];
        values.extend(ids.iter().map(|id| id as &dyn ToSql));

        let cleared = self.conn.execute(&sql, values.as_slice())?;
        Ok(cleared)
    }

    #[instrument(skip(self))]
    fn clear_where_player(&self, player_id: PlayerId) -> Result<usize> {
        let revision = self.next_revision()?;
        let cleared = self.conn.execute(
            "UPDATE slots SET player_id = NULL, modified_at = ?1, revision = ?2
             WHERE player_id = ?3",
            params![Utc::now().to_rfc3339(), revision, player_id],
        )?;
        Ok(cleared)
    }

    #[instrument(skip(self))]
    fn read_all(&self) -> Result<Vec<Slot>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM slots ORDER BY round, pick_in_round",
            SLOT_COLUMNS
        ))?;

        let slots = stmt
            .query_map([], slot_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(slots)
    }

    #[instrument(skip(self))]
    fn most_recent_assigned(&self) -> Result<Option<Slot>> {
        let slot = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM slots WHERE player_id IS NOT NULL
                     ORDER BY revision DESC, slot_id ASC LIMIT 1",
                    SLOT_COLUMNS
                ),
                [],
                slot_from_row,
            )
            .optional()?;
        Ok(slot)
    }

    #[instrument(skip(self))]
    fn assigned_elsewhere(&self, player_id: PlayerId, except: &SlotId) -> Result<Option<SlotId>> {
        let slot_id = self
            .conn
            .query_row(
                "SELECT slot_id FROM slots WHERE player_id = ?1 AND slot_id != ?2
                 ORDER BY slot_id LIMIT 1",
                params![player_id, except.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(slot_id.map(SlotId::from))
    }
}
