//! # typeduel
//!
//! Real-time sync server for multiplayer typing races and verse quizzes.
//!
//! Players hold a WebSocket open to `/ws/{lobby_id}?token=...`. The server
//! checks the ticket, the player and their seat in the lobby, then hands
//! the connection to that lobby's actor, which runs the countdown, the
//! rounds and the results and broadcasts every step to the other seats.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use typeduel::prelude::*;
//!
//! # async fn run() -> Result<(), TypeduelError> {
//! let tickets = Arc::new(TicketBook::default());
//! let server = TypeduelServer::<Arc<TicketBook>>::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(Arc::clone(&tickets))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;
mod supervisor;
mod telemetry;

pub use error::TypeduelError;
pub use server::{TypeduelServer, TypeduelServerBuilder};
pub use supervisor::SupervisorConfig;
pub use telemetry::init_tracing;

/// Common imports for embedding the server.
pub mod prelude {
    pub use crate::{
        SupervisorConfig, TypeduelError, TypeduelServer, TypeduelServerBuilder, init_tracing,
    };
    pub use typeduel_lobby::{
        EngineConfig, JanitorConfig, LobbyDirectory, LobbyMode, LobbyRequest, LobbyStatus,
        LobbyStore, MemoryStore, PlayerRecord, SharedStore, StaticPassages, join_lobby,
        open_lobby,
    };
    pub use typeduel_protocol::{ClientMessage, LobbyId, PlayerId, ServerMessage};
    pub use typeduel_session::{Authenticator, SessionError, TicketBook};
    pub use typeduel_transport::CloseReason;
}
