//! Draftboard Core Library
//!
//! Models, storage, accounts, the draft clock and the coordinator that
//! applies every board mutation for a live fantasy-football draft.

pub mod accounts;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod models;
pub mod storage;

pub use accounts::{Authenticator, SessionAuthenticator};
pub use clock::{ClockEngine, ClockOutcome, ClockSkip, ClockState, DraftClock, DEFAULT_DURATION_MS, MAX_DURATION_MS};
pub use coordinator::{Change, DraftCoordinator, JoinState, NoOpReason, Outcome, PickRequest};
pub use error::{Error, Result};
pub use events::{DraftEvent, Publisher};
pub use models::*;
pub use storage::{BoardStore, Database, OwnerStore, PlayerStore, SlotStore, UserStore, SEARCH_LIMIT};
