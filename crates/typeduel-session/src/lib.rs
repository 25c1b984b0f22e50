//! Connect-credential authentication for typeduel.
//!
//! 1. **Authentication**: turning a connect credential into a player
//!    identity ([`Authenticator`] trait)
//! 2. **Tickets**: short-lived, reusable connect tickets ([`TicketBook`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby Layer (above)  ← only ever sees authenticated PlayerIds
//!     ↕
//! Session Layer (this crate)  ← validates the credential in the WebSocket URL
//!     ↕
//! Protocol Layer (below)  ← provides PlayerId
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod tickets;

pub use auth::Authenticator;
pub use error::SessionError;
pub use tickets::{DEFAULT_TICKET_TTL, TicketBook};
