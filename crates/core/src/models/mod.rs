//! Data models for the draft board

mod board;
mod owner;
mod player;
mod slot;
mod user;

pub use board::*;
pub use owner::*;
pub use player::*;
pub use slot::*;
pub use user::*;
