//! Network error types

use std::io;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    /// Framing violation; the connection cannot continue
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A well-framed payload that is not a known message
    #[error("Undecodable message: {0}")]
    Decode(String),

    #[error("Connection rejected: {0}")]
    Rejected(String),

    #[error("Not connected")]
    NotConnected,

    #[error(transparent)]
    Core(#[from] draftboard_core::Error),
}
