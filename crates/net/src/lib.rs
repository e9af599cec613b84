//! Draftboard Network Library
//!
//! TCP transport for the live draft board.
//!
//! # Architecture
//!
//! - **Server**: authenticates sessions and routes their intents to the
//!   coordinator and clock
//! - **Bus**: fans every draft event out to all joined sessions
//! - **Client**: connects to a server and mirrors the board locally
//! - **Protocol**: Length-prefixed JSON messages
//!
//! # Usage
//!
//! ```ignore
//! let server = Server::start(7340, ServerContext::new(db, DEFAULT_DURATION_MS, 24)).await?;
//!
//! let credentials = Client::login(addr, "commish", "hunter2").await?;
//! let mut client = Client::connect(addr, credentials.token).await?;
//! client.pick(None, "T3-R7", player_id).await?;
//!
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         ServerEvent::Board(board) => { /* redraw */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod bus;
pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod server;

pub use bus::BroadcastBus;
pub use client::{Client, ConnectionState, Credentials, ServerEvent};
pub use error::{Error, Result};
pub use frame::MAX_FRAME_SIZE;
pub use protocol::{Message, PlayerRef};
pub use server::{Server, ServerContext};

/// Default port for draft servers
pub const DEFAULT_PORT: u16 = 7340;
