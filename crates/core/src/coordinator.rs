//! Draft coordinator
//!
//! Validates and applies board mutations against the store inside a
//! transaction, then publishes the result. The database lock is held until
//! the resulting snapshot has been published, so subscribers observe board
//! updates in commit order.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::clock::{ClockEngine, ClockState};
use crate::error::{Error, Result};
use crate::events::{DraftEvent, Publisher};
use crate::models::{BoardSnapshot, DraftLayout, NewPlayer, Player, PlayerId, SlotId};
use crate::storage::{BoardStore, Database, SlotStore};

/// A pick intent: place `player_id` into `to_slot_id`, optionally moving it
/// out of `from_slot_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickRequest {
    pub from_slot_id: Option<SlotId>,
    pub to_slot_id: SlotId,
    pub player_id: Option<PlayerId>,
}

impl PickRequest {
    pub fn new(to_slot_id: impl Into<SlotId>, player_id: PlayerId) -> Self {
        Self {
            from_slot_id: None,
            to_slot_id: to_slot_id.into(),
            player_id: Some(player_id),
        }
    }

    pub fn moving_from(mut self, from_slot_id: impl Into<SlotId>) -> Self {
        self.from_slot_id = Some(from_slot_id.into());
        self
    }
}

/// What a committed operation changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Picked {
        owner_id: String,
        slot_id: SlotId,
        player_id: PlayerId,
    },
    Reset {
        cleared: usize,
    },
    Cleared {
        cleared: usize,
    },
    Undone {
        slot_id: SlotId,
    },
    OwnerRenamed {
        owner_id: String,
        name: String,
    },
}

/// Why an operation was skipped without touching the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    EmptySelection,
    NothingToUndo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(Change),
    NoOp(NoOpReason),
}

/// State pushed to a session when it joins
#[derive(Debug, Clone)]
pub struct JoinState {
    pub board: BoardSnapshot,
    pub owners: BTreeMap<String, String>,
    pub clock: ClockState,
}

/// Store errors surface to the requester as retryable transaction failures
fn rolled_back(err: Error) -> Error {
    match err {
        Error::Database(e) => Error::TransactionFailure(e.to_string()),
        other => other,
    }
}

/// Transaction body for a pick
fn apply_pick<S: BoardStore>(
    store: &S,
    from: Option<&SlotId>,
    to: &SlotId,
    player_id: PlayerId,
) -> Result<()> {
    if let Some(from) = from.filter(|from| *from != to) {
        store.assign(from, None)?;
    }
    if let Some(existing) = store.assigned_elsewhere(player_id, to)? {
        debug!(slot_id = %existing, "Player still assigned elsewhere");
        return Err(Error::PlayerAlreadyDrafted(player_id));
    }
    store.assign(to, Some(player_id))
}

/// Transaction body for an undo
fn apply_undo<S: BoardStore>(store: &S) -> Result<Option<SlotId>> {
    match store.most_recent_assigned()? {
        Some(slot) => {
            store.assign(&slot.id, None)?;
            Ok(Some(slot.id))
        }
        None => Ok(None),
    }
}

pub struct DraftCoordinator {
    db: Arc<Mutex<Database>>,
    clock: Arc<ClockEngine>,
    publisher: Arc<dyn Publisher>,
}

impl DraftCoordinator {
    pub fn new(
        db: Arc<Mutex<Database>>,
        clock: Arc<ClockEngine>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            db,
            clock,
            publisher,
        }
    }

    fn lock_db(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| Error::TransactionFailure("database lock poisoned".into()))
    }

    /// Broadcast the committed board. The mutation has already been applied,
    /// so a failed read is logged rather than reported to the requester.
    fn publish_board(&self, db: &Database) {
        match db.board_snapshot() {
            Ok(snapshot) => self.publisher.publish(DraftEvent::BoardUpdate(snapshot)),
            Err(e) => {
                error!(error = %e, "Failed to read board after commit; update not published")
            }
        }
    }

    /// Record a pick (or a move when `from_slot_id` is set) and stop the clock
    #[instrument(skip(self, request), fields(to_slot_id = %request.to_slot_id))]
    pub fn pick(&self, request: PickRequest) -> Result<Outcome> {
        let player_id = request
            .player_id
            .ok_or_else(|| Error::InvalidPayload("player with an id is required".into()))?;
        let to = request.to_slot_id;
        if to.as_str().is_empty() {
            return Err(Error::InvalidPayload("target slot is required".into()));
        }

        let mut db = self.lock_db()?;
        db.in_transaction(|tx| {
            apply_pick(&SlotStore::new(tx), request.from_slot_id.as_ref(), &to, player_id)
        })
        .map_err(|err| {
            warn!(error = %err, "Pick rolled back");
            rolled_back(err)
        })?;

        let owner_id = to.owner_id().to_string();
        info!(owner_id = %owner_id, round = ?to.round(), player_id, "Pick recorded");

        self.clock.stop();
        self.publish_board(&db);

        Ok(Outcome::Applied(Change::Picked {
            owner_id,
            slot_id: to,
            player_id,
        }))
    }

    /// Clear the whole board and stop the clock
    #[instrument(skip(self))]
    pub fn reset(&self) -> Result<Outcome> {
        let mut db = self.lock_db()?;
        let cleared = db
            .in_transaction(|tx| SlotStore::new(tx).clear_all())
            .map_err(|err| {
                warn!(error = %err, "Reset rolled back");
                rolled_back(err)
            })?;

        info!(cleared, "Draft board reset");
        self.clock.stop();
        self.publish_board(&db);
        Ok(Outcome::Applied(Change::Reset { cleared }))
    }

    /// Clear the selected slots. An empty selection is a no-op.
    #[instrument(skip(self, slot_ids), fields(count = slot_ids.len()))]
    pub fn delete_multiple(&self, slot_ids: &[SlotId]) -> Result<Outcome> {
        if slot_ids.is_empty() {
            return Ok(Outcome::NoOp(NoOpReason::EmptySelection));
        }

        let mut db = self.lock_db()?;
        let cleared = db
            .in_transaction(|tx| SlotStore::new(tx).bulk_clear(slot_ids))
            .map_err(rolled_back)?;

        info!(cleared, "Cleared selected slots");
        self.publish_board(&db);
        Ok(Outcome::Applied(Change::Cleared { cleared }))
    }

    /// Clear the most recently written assigned slot
    #[instrument(skip(self))]
    pub fn undo(&self) -> Result<Outcome> {
        let mut db = self.lock_db()?;
        let undone = db
            .in_transaction(|tx| apply_undo(&SlotStore::new(tx)))
            .map_err(rolled_back)?;

        match undone {
            Some(slot_id) => {
                info!(slot_id = %slot_id, "Undid last pick");
                self.publish_board(&db);
                Ok(Outcome::Applied(Change::Undone { slot_id }))
            }
            None => Ok(Outcome::NoOp(NoOpReason::NothingToUndo)),
        }
    }

    /// Change an owner's display name
    #[instrument(skip(self))]
    pub fn rename_owner(&self, owner_id: &str, name: &str) -> Result<Outcome> {
        let name = name.trim();
        if owner_id.is_empty() || name.is_empty() {
            return Err(Error::InvalidPayload("owner id and name are required".into()));
        }

        let db = self.lock_db()?;
        db.owners().rename(owner_id, name)?;
        info!(owner_id, name, "Owner renamed");

        self.publisher.publish(DraftEvent::OwnerUpdated {
            owner_id: owner_id.to_string(),
            name: name.to_string(),
        });
        Ok(Outcome::Applied(Change::OwnerRenamed {
            owner_id: owner_id.to_string(),
            name: name.to_string(),
        }))
    }

    /// Everything a newly joined session needs
    pub fn join_state(&self) -> Result<JoinState> {
        let db = self.lock_db()?;
        Ok(JoinState {
            board: db.board_snapshot()?,
            owners: db.owners().names()?,
            clock: self.clock.state(),
        })
    }

    pub fn snapshot(&self) -> Result<BoardSnapshot> {
        self.lock_db()?.board_snapshot()
    }

    pub fn owner_names(&self) -> Result<BTreeMap<String, String>> {
        self.lock_db()?.owners().names()
    }

    pub fn layout(&self) -> Result<DraftLayout> {
        self.lock_db()?.layout()
    }

    pub fn search_players(&self, query: &str) -> Result<Vec<Player>> {
        self.lock_db()?.players().search_available(query)
    }

    /// Add a draftable player. Name and position are required.
    #[instrument(skip(self, player), fields(name = %player.name))]
    pub fn add_player(&self, player: NewPlayer) -> Result<Player> {
        if player.name.trim().is_empty() || player.position.trim().is_empty() {
            return Err(Error::InvalidPayload("name and position are required".into()));
        }
        let player = NewPlayer {
            name: player.name.trim().to_string(),
            position: player.position.trim().to_string(),
            ..player
        };
        self.lock_db()?.players().create(&player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DEFAULT_DURATION_MS;
    use crate::events::RecordingPublisher;
    use crate::models::DraftLayout;

    struct Harness {
        db: Arc<Mutex<Database>>,
        publisher: Arc<RecordingPublisher>,
        clock: Arc<ClockEngine>,
        coordinator: Arc<DraftCoordinator>,
    }

    impl Harness {
        fn new(owners: u32, rounds: u32) -> Self {
            let mut db = Database::open_in_memory().unwrap();
            db.initialize_draft(DraftLayout { owners, rounds }).unwrap();
            let db = Arc::new(Mutex::new(db));
            let publisher = Arc::new(RecordingPublisher::new());
            let clock = ClockEngine::new(DEFAULT_DURATION_MS, publisher.clone());
            let coordinator = Arc::new(DraftCoordinator::new(
                db.clone(),
                clock.clone(),
                publisher.clone(),
            ));
            Self {
                db,
                publisher,
                clock,
                coordinator,
            }
        }

        fn player(&self, name: &str) -> PlayerId {
            self.coordinator
                .add_player(NewPlayer::new(name, "RB"))
                .unwrap()
                .id
        }

        fn holder(&self, slot: &str) -> Option<PlayerId> {
            let db = self.db.lock().unwrap();
            db.slots().find(&SlotId::from(slot)).unwrap().unwrap().player_id
        }

        fn revisions(&self) -> Vec<u64> {
            let db = self.db.lock().unwrap();
            db.slots()
                .read_all()
                .unwrap()
                .into_iter()
                .map(|s| s.revision)
                .collect()
        }
    }

    #[test]
    fn test_pick_stops_clock_then_publishes_board() {
        let h = Harness::new(2, 2);
        let cmc = h.player("Christian McCaffrey");

        let outcome = h.coordinator.pick(PickRequest::new("T2-R1", cmc)).unwrap();
        assert_eq!(
            outcome,
            Outcome::Applied(Change::Picked {
                owner_id: "T2".into(),
                slot_id: SlotId::from("T2-R1"),
                player_id: cmc,
            })
        );

        let events = h.publisher.take();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            DraftEvent::ClockUpdate(ClockState::stopped(DEFAULT_DURATION_MS))
        );
        match &events[1] {
            DraftEvent::BoardUpdate(board) => {
                assert_eq!(board.len(), 1);
                assert_eq!(board.get(&SlotId::from("T2-R1")).unwrap().id, cmc);
            }
            other => panic!("expected board update, got {:?}", other),
        }
    }

    #[test]
    fn test_committed_pick_applies_when_board_read_fails() {
        let h = Harness::new(2, 1);
        // A bye week that cannot decode as u32 makes every snapshot read fail
        let broken = h
            .db
            .lock()
            .unwrap()
            .in_transaction(|tx| {
                tx.execute(
                    "INSERT INTO players (name, position, bye_week) VALUES ('Bad Row', 'RB', -1)",
                    [],
                )?;
                Ok(tx.last_insert_rowid())
            })
            .unwrap();

        let outcome = h.coordinator.pick(PickRequest::new("T1-R1", broken)).unwrap();
        assert!(matches!(outcome, Outcome::Applied(Change::Picked { .. })));
        assert_eq!(h.holder("T1-R1"), Some(broken));

        let events = h.publisher.take();
        assert_eq!(
            events,
            vec![DraftEvent::ClockUpdate(ClockState::stopped(DEFAULT_DURATION_MS))]
        );
    }

    #[tokio::test]
    async fn test_pick_stops_running_clock() {
        let h = Harness::new(2, 1);
        let player = h.player("Breece Hall");
        h.clock.start("T1");
        assert!(h.clock.state().is_running);

        h.coordinator.pick(PickRequest::new("T1-R1", player)).unwrap();
        assert!(!h.clock.state().is_running);
    }

    #[test]
    fn test_pick_without_player_id_is_invalid() {
        let h = Harness::new(2, 1);
        let before = h.revisions();

        let request = PickRequest {
            from_slot_id: None,
            to_slot_id: SlotId::from("T1-R1"),
            player_id: None,
        };
        assert!(matches!(
            h.coordinator.pick(request),
            Err(Error::InvalidPayload(_))
        ));
        assert!(h.publisher.is_empty());
        assert_eq!(h.revisions(), before);
    }

    #[test]
    fn test_pick_then_undo_restores_slot() {
        let h = Harness::new(3, 2);
        let player = h.player("Jahmyr Gibbs");

        h.coordinator.pick(PickRequest::new("T3-R2", player)).unwrap();
        assert_eq!(h.holder("T3-R2"), Some(player));

        let outcome = h.coordinator.undo().unwrap();
        assert_eq!(
            outcome,
            Outcome::Applied(Change::Undone {
                slot_id: SlotId::from("T3-R2")
            })
        );
        assert_eq!(h.holder("T3-R2"), None);
        assert!(h.coordinator.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_undo_clears_latest_pick_first() {
        let h = Harness::new(2, 2);
        let first = h.player("First");
        let second = h.player("Second");
        h.coordinator.pick(PickRequest::new("T2-R2", first)).unwrap();
        h.coordinator.pick(PickRequest::new("T1-R1", second)).unwrap();

        h.coordinator.undo().unwrap();
        assert_eq!(h.holder("T1-R1"), None);
        assert_eq!(h.holder("T2-R2"), Some(first));

        h.coordinator.undo().unwrap();
        assert_eq!(h.holder("T2-R2"), None);
    }

    #[test]
    fn test_undo_on_empty_board_is_noop() {
        let h = Harness::new(2, 1);
        assert_eq!(
            h.coordinator.undo().unwrap(),
            Outcome::NoOp(NoOpReason::NothingToUndo)
        );
        assert!(h.publisher.is_empty());
    }

    #[test]
    fn test_move_clears_source_and_sets_target() {
        let h = Harness::new(2, 2);
        let player = h.player("Travis Kelce");
        h.coordinator.pick(PickRequest::new("T1-R1", player)).unwrap();

        h.coordinator
            .pick(PickRequest::new("T2-R2", player).moving_from("T1-R1"))
            .unwrap();

        assert_eq!(h.holder("T1-R1"), None);
        assert_eq!(h.holder("T2-R2"), Some(player));
    }

    #[test]
    fn test_failed_move_rolls_back_source() {
        let h = Harness::new(2, 1);
        let player = h.player("Puka Nacua");
        h.coordinator.pick(PickRequest::new("T1-R1", player)).unwrap();
        h.publisher.take();

        let result = h
            .coordinator
            .pick(PickRequest::new("T7-R9", player).moving_from("T1-R1"));

        assert!(matches!(result, Err(Error::SlotNotFound(_))));
        assert_eq!(h.holder("T1-R1"), Some(player));
        assert!(h.publisher.is_empty());
    }

    #[test]
    fn test_unknown_player_is_retryable_transaction_failure() {
        let h = Harness::new(1, 1);
        let err = h
            .coordinator
            .pick(PickRequest::new("T1-R1", 999))
            .unwrap_err();
        assert!(matches!(err, Error::TransactionFailure(_)));
        assert!(err.is_retryable());
        assert!(h.publisher.is_empty());
    }

    #[test]
    fn test_duplicate_assignment_rejected() {
        let h = Harness::new(2, 1);
        let player = h.player("Amon-Ra St. Brown");
        h.coordinator.pick(PickRequest::new("T1-R1", player)).unwrap();
        h.publisher.take();

        let result = h.coordinator.pick(PickRequest::new("T2-R1", player));
        assert!(matches!(result, Err(Error::PlayerAlreadyDrafted(id)) if id == player));
        assert_eq!(h.holder("T1-R1"), Some(player));
        assert_eq!(h.holder("T2-R1"), None);
        assert!(h.publisher.is_empty());

        // Re-picking into the slot that already holds the player is fine
        h.coordinator.pick(PickRequest::new("T1-R1", player)).unwrap();
    }

    #[test]
    fn test_pick_over_occupied_slot_frees_previous_player() {
        let h = Harness::new(1, 1);
        let first = h.player("Mahomes Backup");
        let second = h.player("Tua Tagovailoa");
        h.coordinator.pick(PickRequest::new("T1-R1", first)).unwrap();
        h.coordinator.pick(PickRequest::new("T1-R1", second)).unwrap();

        let available = h.coordinator.search_players("mahomes").unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, first);
    }

    #[test]
    fn test_reset_clears_every_slot() {
        let h = Harness::new(3, 3);
        for (slot, name) in [("T1-R1", "A"), ("T2-R2", "B"), ("T3-R3", "C")] {
            let player = h.player(name);
            h.coordinator.pick(PickRequest::new(slot, player)).unwrap();
        }
        h.publisher.take();

        assert_eq!(
            h.coordinator.reset().unwrap(),
            Outcome::Applied(Change::Reset { cleared: 3 })
        );
        let db = h.db.lock().unwrap();
        assert!(db.slots().read_all().unwrap().iter().all(|s| !s.is_assigned()));
        drop(db);

        let events = h.publisher.take();
        assert!(matches!(&events[0], DraftEvent::ClockUpdate(state) if !state.is_running));
        assert_eq!(events[1], DraftEvent::BoardUpdate(BoardSnapshot::default()));
    }

    #[test]
    fn test_delete_multiple_empty_is_noop() {
        let h = Harness::new(2, 2);
        let before = h.revisions();

        assert_eq!(
            h.coordinator.delete_multiple(&[]).unwrap(),
            Outcome::NoOp(NoOpReason::EmptySelection)
        );
        assert_eq!(h.revisions(), before);
        assert!(h.publisher.is_empty());
    }

    #[tokio::test]
    async fn test_delete_multiple_leaves_clock_alone() {
        let h = Harness::new(2, 1);
        let a = h.player("A");
        let b = h.player("B");
        h.coordinator.pick(PickRequest::new("T1-R1", a)).unwrap();
        h.coordinator.pick(PickRequest::new("T2-R1", b)).unwrap();
        h.clock.start("T1");
        h.publisher.take();

        h.coordinator
            .delete_multiple(&[SlotId::from("T2-R1")])
            .unwrap();

        assert!(h.clock.state().is_running);
        let events = h.publisher.take();
        assert_eq!(events.len(), 1);
        match &events[0] {
            DraftEvent::BoardUpdate(board) => {
                assert_eq!(board.len(), 1);
                assert_eq!(board.slot_of(a), Some(&SlotId::from("T1-R1")));
            }
            other => panic!("expected board update, got {:?}", other),
        }
    }

    #[test]
    fn test_rename_owner() {
        let h = Harness::new(2, 1);
        h.coordinator.rename_owner("T2", "  Gridiron Gurus ").unwrap();

        assert_eq!(
            h.publisher.take(),
            vec![DraftEvent::OwnerUpdated {
                owner_id: "T2".into(),
                name: "Gridiron Gurus".into()
            }]
        );
        assert_eq!(
            h.coordinator.join_state().unwrap().owners["T2"],
            "Gridiron Gurus"
        );
        assert!(matches!(
            h.coordinator.rename_owner("T2", "   "),
            Err(Error::InvalidPayload(_))
        ));
        assert!(matches!(
            h.coordinator.rename_owner("T99", "Ghosts"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_moves_never_expose_partial_state() {
        let h = Harness::new(2, 1);
        let player = h.player("Ja'Marr Chase");
        h.coordinator.pick(PickRequest::new("T1-R1", player)).unwrap();

        let movers: Vec<_> = [("T1-R1", "T2-R1"), ("T2-R1", "T1-R1")]
            .into_iter()
            .map(|(from, to)| {
                let coordinator = h.coordinator.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        // Either direction may lose the race; a lost race is
                        // a clean rejection, never a torn board
                        let _ = coordinator.pick(PickRequest::new(to, player).moving_from(from));
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            let board = h.coordinator.snapshot().unwrap();
            assert_eq!(board.len(), 1, "player must sit in exactly one slot");
        }

        for mover in movers {
            mover.join().unwrap();
        }
        assert_eq!(h.coordinator.snapshot().unwrap().len(), 1);
    }
}
