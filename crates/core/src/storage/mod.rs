//! SQLite storage layer for the draft board

mod migrations;
mod owners;
mod parse;
mod players;
mod slots;
mod traits;
mod users;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::{BoardSnapshot, DraftLayout, Owner};

pub use owners::OwnerStore;
pub use players::{PlayerStore, SEARCH_LIMIT};
pub use slots::SlotStore;
pub use traits::BoardStore;
pub use users::UserStore;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        migrations::run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        migrations::get_current_version(&self.conn).unwrap_or(0)
    }

    pub fn slots(&self) -> SlotStore<'_> {
        SlotStore::new(&self.conn)
    }

    pub fn players(&self) -> PlayerStore<'_> {
        PlayerStore::new(&self.conn)
    }

    pub fn owners(&self) -> OwnerStore<'_> {
        OwnerStore::new(&self.conn)
    }

    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(&self.conn)
    }

    /// Run `f` inside an IMMEDIATE transaction.
    ///
    /// Commits when `f` returns `Ok`; any error drops the transaction, which
    /// rolls back every statement `f` executed.
    pub fn in_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let tx = Transaction::new(&mut self.conn, TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Seed owners and the empty slot grid on first start.
    ///
    /// Returns `false` without touching anything when owners already exist,
    /// so existing picks survive restarts.
    #[instrument(skip(self))]
    pub fn initialize_draft(&mut self, layout: DraftLayout) -> Result<bool> {
        if self.owners().count()? > 0 {
            info!("Existing draft data found, skipping seeding");
            return Ok(false);
        }

        let created = self.in_transaction(|tx| {
            let owners: Vec<Owner> = (1..=layout.owners).map(Owner::seeded).collect();
            let owner_store = OwnerStore::new(tx);
            for owner in &owners {
                owner_store.create(owner)?;
            }
            SlotStore::new(tx).create_grid(&owners, layout.rounds)
        })?;

        info!(
            owners = layout.owners,
            rounds = layout.rounds,
            slots = created,
            "Seeded draft board"
        );
        Ok(true)
    }

    /// Grid dimensions as stored
    pub fn layout(&self) -> Result<DraftLayout> {
        let owners = self.owners().count()?;
        let rounds: Option<u32> =
            self.conn
                .query_row("SELECT MAX(round) FROM slots", [], |row| row.get(0))?;
        Ok(DraftLayout {
            owners,
            rounds: rounds.unwrap_or(0),
        })
    }

    pub fn board_snapshot(&self) -> Result<BoardSnapshot> {
        self.slots().snapshot()
    }
}
