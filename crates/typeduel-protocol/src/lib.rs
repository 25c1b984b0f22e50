//! Wire protocol for typeduel.
//!
//! This crate defines what players and the server say to each other:
//!
//! - **Types** ([`PlayerId`], [`LobbyId`], result rows) shared by both
//!   directions.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]) as closed
//!   tagged unions.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) turning messages into
//!   frames and back.
//!
//! The protocol layer knows nothing about connections or lobbies.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Lobby actor
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{ClientMessage, ServerMessage};
pub use types::{
    CumulativeStanding, LobbyId, PlayerId, QuizScore, QuizStanding, RaceResult,
};
