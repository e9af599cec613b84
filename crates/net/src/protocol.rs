//! Network protocol message types
//!
//! All messages are JSON objects tagged by `type` (snake_case) and
//! length-prefixed on the wire.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use draftboard_core::{BoardSnapshot, ClockState, DraftEvent, NewPlayer, Player, PlayerId};

/// Player reference carried by a pick. Clients usually send the full player
/// object; only the id matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRef {
    #[serde(default)]
    pub id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&Player> for PlayerRef {
    fn from(player: &Player) -> Self {
        Self {
            id: Some(player.id),
            name: Some(player.name.clone()),
        }
    }
}

/// Network protocol messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    // Handshake
    Register {
        username: String,
        password: String,
    },
    Registered {
        user_id: Uuid,
    },
    Login {
        username: String,
        password: String,
    },
    LoginAccepted {
        token: String,
        expires_at: DateTime<Utc>,
    },
    /// Attach to the live draft with a session token
    Join {
        #[serde(default)]
        token: Option<String>,
    },
    JoinAccepted {
        username: String,
    },
    JoinRejected {
        reason: String,
    },
    /// Register or login failed
    Rejected {
        reason: String,
    },

    // Draft intents
    Pick {
        #[serde(default)]
        from_slot_id: Option<String>,
        to_slot_id: String,
        #[serde(default)]
        player: Option<PlayerRef>,
    },
    Reset,
    DeleteMultiple {
        #[serde(default)]
        slot_ids: Option<Vec<String>>,
    },
    Undo,
    ClockStart {
        owner_id: String,
    },
    ClockStop,
    /// Duration in minutes
    ClockSetDuration {
        duration: f64,
    },
    OwnerRename {
        owner_id: String,
        name: String,
    },

    // Requester-only queries
    SearchPlayers {
        #[serde(default)]
        query: String,
    },
    GetConfig,
    AddPlayer(NewPlayer),
    Ping,

    // Server to client
    BoardUpdate {
        board: BoardSnapshot,
    },
    ClockUpdate {
        clock: ClockState,
    },
    OwnerLoad {
        owners: BTreeMap<String, String>,
    },
    OwnerUpdated {
        owner_id: String,
        name: String,
    },
    DraftError {
        message: String,
    },
    SearchResults {
        players: Vec<Player>,
    },
    Config {
        owners: u32,
        rounds: u32,
    },
    PlayerAdded {
        player: Player,
    },
    Pong,

    /// Server is shutting down
    ServerShutdown,
}

impl Message {
    /// Serialize message to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize message from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn draft_error(message: impl Into<String>) -> Self {
        Message::DraftError {
            message: message.into(),
        }
    }
}

impl From<DraftEvent> for Message {
    fn from(event: DraftEvent) -> Self {
        match event {
            DraftEvent::BoardUpdate(board) => Message::BoardUpdate { board },
            DraftEvent::ClockUpdate(clock) => Message::ClockUpdate { clock },
            DraftEvent::OwnerLoad(owners) => Message::OwnerLoad { owners },
            DraftEvent::OwnerUpdated { owner_id, name } => Message::OwnerUpdated { owner_id, name },
        }
    }
}
