//! Database value parsing utilities
//!
//! Converts stored TEXT/INTEGER columns back into model types.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Error as SqlError, Row};
use uuid::Uuid;

use crate::models::{Player, Slot, SlotId, User};

fn conversion_error<E>(err: E) -> SqlError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SqlError::FromSqlConversionFailure(0, Type::Text, Box::new(err))
}

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(conversion_error)
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_error)
}

/// Parse an optional DateTime from an RFC3339 string
pub fn parse_datetime_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, SqlError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Columns: slot_id, owner_id, round, pick_in_round, player_id, modified_at, revision
pub const SLOT_COLUMNS: &str =
    "slot_id, owner_id, round, pick_in_round, player_id, modified_at, revision";

pub fn slot_from_row(row: &Row<'_>) -> Result<Slot, SqlError> {
    Ok(Slot {
        id: SlotId::from(row.get::<_, String>(0)?),
        owner_id: row.get(1)?,
        round: row.get(2)?,
        pick_in_round: row.get(3)?,
        player_id: row.get(4)?,
        modified_at: parse_datetime(&row.get::<_, String>(5)?)?,
        revision: row.get(6)?,
    })
}

/// Columns: id, name, position, team, bye_week (starting at `offset`)
pub fn player_from_row(row: &Row<'_>, offset: usize) -> Result<Player, SqlError> {
    Ok(Player {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        position: row.get(offset + 2)?,
        team: row.get(offset + 3)?,
        bye_week: row.get(offset + 4)?,
    })
}

/// Columns: id, username, password_hash, created_at, last_login
pub fn user_from_row(row: &Row<'_>) -> Result<User, SqlError> {
    Ok(User {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?)?,
        last_login: parse_datetime_opt(row.get::<_, Option<String>>(4)?)?,
    })
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
