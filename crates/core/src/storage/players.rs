//! Player storage operations

use rusqlite::{params, Connection};
use tracing::instrument;

use super::parse::player_from_row;
use crate::error::Result;
use crate::models::{NewPlayer, Player};

/// Maximum number of results returned by a player search
pub const SEARCH_LIMIT: usize = 10;

pub struct PlayerStore<'a> {
    conn: &'a Connection,
}

impl<'a> PlayerStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a player and return it with its assigned id
    #[instrument(skip(self, player), fields(name = %player.name))]
    pub fn create(&self, player: &NewPlayer) -> Result<Player> {
        self.conn.execute(
            "INSERT INTO players (name, position, team, bye_week) VALUES (?1, ?2, ?3, ?4)",
            params![player.name, player.position, player.team, player.bye_week],
        )?;

        Ok(Player {
            id: self.conn.last_insert_rowid(),
            name: player.name.clone(),
            position: player.position.clone(),
            team: player.team.clone(),
            bye_week: player.bye_week,
        })
    }

    /// Undrafted players whose name contains `query`, case-insensitively.
    /// An empty query matches nothing.
    #[instrument(skip(self))]
    pub fn search_available(&self, query: &str) -> Result<Vec<Player>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = format!("%{}%", escape_like(query));
        let mut stmt = self.conn.prepare(
            "SELECT id, name, position, team, bye_week FROM players
             WHERE name LIKE ?1 ESCAPE '\\'
               AND id NOT IN (SELECT player_id FROM slots WHERE player_id IS NOT NULL)
             ORDER BY name, id
             LIMIT ?2",
        )?;

        let players = stmt
            .query_map(params![pattern, SEARCH_LIMIT], |row| player_from_row(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(players)
    }

    pub fn count(&self) -> Result<u64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("Mahomes"), "Mahomes");
    }
}
