//! Owner storage operations

use std::collections::BTreeMap;

use rusqlite::{params, Connection};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::models::Owner;

pub struct OwnerStore<'a> {
    conn: &'a Connection,
}

impl<'a> OwnerStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, owner), fields(owner_id = %owner.id))]
    pub fn create(&self, owner: &Owner) -> Result<()> {
        self.conn.execute(
            "INSERT INTO owners (id, name, draft_position) VALUES (?1, ?2, ?3)",
            params![owner.id, owner.name, owner.draft_position],
        )?;
        Ok(())
    }

    /// All owners in draft order
    pub fn list(&self) -> Result<Vec<Owner>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, draft_position FROM owners ORDER BY draft_position")?;

        let owners = stmt
            .query_map([], |row| {
                Ok(Owner {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    draft_position: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(owners)
    }

    /// Owner id -> display name
    pub fn names(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .list()?
            .into_iter()
            .map(|owner| (owner.id, owner.name))
            .collect())
    }

    #[instrument(skip(self))]
    pub fn rename(&self, owner_id: &str, name: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE owners SET name = ?1 WHERE id = ?2",
            params![name, owner_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("owner {}", owner_id)));
        }
        Ok(())
    }

    pub fn count(&self) -> Result<u32> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM owners", [], |row| row.get(0))?;
        Ok(count)
    }
}
