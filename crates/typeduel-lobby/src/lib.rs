//! Lobby lifecycle for typeduel.
//!
//! Each lobby with live connections runs as an isolated Tokio task (actor
//! model) that owns its connections, its race or quiz state and its
//! pacing. Persistent rows live behind the [`LobbyStore`] trait and
//! passage text behind [`PassageSource`].
//!
//! # Key types
//!
//! - [`LobbyDirectory`]: opens, tracks and evicts lobby actors
//! - [`LobbyHandle`]: send commands to a running lobby actor
//! - [`LobbyStatus`]: the forward-only lifecycle
//! - [`EngineConfig`]: pacing and buffer sizes
//! - [`Janitor`]: sweeps stale lobbies
//! - [`open_lobby`] / [`join_lobby`]: admission by join code

mod actor;
mod admission;
mod config;
mod directory;
mod error;
mod janitor;
pub mod passage;
mod quiz;
mod race;
mod registry;
mod rounds;
pub mod store;

pub use actor::{LobbyHandle, LobbySnapshot};
pub use admission::{
    JOIN_CODE_ALPHABET, JOIN_CODE_LEN, LobbyRequest, generate_join_code, join_lobby, open_lobby,
};
pub use config::{EngineConfig, JanitorConfig, LobbyMode, LobbyStatus};
pub use directory::LobbyDirectory;
pub use error::LobbyError;
pub use janitor::Janitor;
pub use passage::{
    BibleVersion, Passage, PassageError, PassageSource, SharedPassageSource, StaticPassages,
};
pub use registry::{Outbound, RaceScratch, Registry};
pub use store::{
    LobbyRecord, LobbyStore, MembershipRecord, MemoryStore, PlayerRecord, SharedStore,
    StoreError,
};
