//! Short-lived connect tickets.
//!
//! A [`TicketBook`] issues random opaque tickets bound to a player and
//! validates them until they expire. It is the in-process counterpart of
//! the account service's credential endpoint and doubles as the
//! authenticator for tests and the development server.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use typeduel_protocol::PlayerId;

use crate::{Authenticator, SessionError};

/// Default ticket lifetime.
pub const DEFAULT_TICKET_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Ticket {
    player_id: PlayerId,
    expires_at: Instant,
}

/// Issues and validates short-lived connect tickets.
///
/// Tickets stay valid until they expire, so a browser that reconnects
/// right after a network blip can reuse the one it already has.
#[derive(Debug)]
pub struct TicketBook {
    ttl: Duration,
    tickets: Mutex<HashMap<String, Ticket>>,
}

impl Default for TicketBook {
    fn default() -> Self {
        Self::new(DEFAULT_TICKET_TTL)
    }
}

impl TicketBook {
    /// Creates an empty book whose tickets live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tickets: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a fresh ticket for `player_id`.
    pub async fn issue(&self, player_id: PlayerId) -> String {
        let token = generate_token();
        let ticket = Ticket {
            player_id,
            expires_at: Instant::now() + self.ttl,
        };
        self.tickets.lock().await.insert(token.clone(), ticket);
        tracing::debug!(%player_id, "connect ticket issued");
        token
    }

    /// Revokes a ticket. Returns `true` if it existed.
    pub async fn revoke(&self, token: &str) -> bool {
        self.tickets.lock().await.remove(token).is_some()
    }

    /// Drops every expired ticket. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut tickets = self.tickets.lock().await;
        let before = tickets.len();
        tickets.retain(|_, t| t.expires_at > now);
        before - tickets.len()
    }

    /// Number of tickets currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.tickets.lock().await.len()
    }

    /// Whether the book holds no tickets.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Authenticator for TicketBook {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, SessionError> {
        if token.is_empty() {
            return Err(SessionError::MissingCredential);
        }
        let mut tickets = self.tickets.lock().await;
        let ticket = tickets
            .get(token)
            .copied()
            .ok_or_else(|| SessionError::AuthFailed("unknown ticket".into()))?;
        if ticket.expires_at <= Instant::now() {
            tickets.remove(token);
            return Err(SessionError::Expired);
        }
        Ok(ticket.player_id)
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    #[test]
    fn test_generate_token_is_32_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[tokio::test(start_paused = true)]
    async fn test_issued_ticket_authenticates_player() {
        let book = TicketBook::default();
        let token = book.issue(pid(5)).await;
        assert_eq!(book.authenticate(&token).await.unwrap(), pid(5));
        // Reusable until expiry.
        assert_eq!(book.authenticate(&token).await.unwrap(), pid(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_ticket_is_rejected_and_dropped() {
        let book = TicketBook::new(Duration::from_secs(10));
        let token = book.issue(pid(1)).await;

        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(matches!(
            book.authenticate(&token).await,
            Err(SessionError::Expired)
        ));
        assert!(book.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_and_empty_tokens_fail() {
        let book = TicketBook::default();
        assert!(matches!(
            book.authenticate("deadbeef").await,
            Err(SessionError::AuthFailed(_))
        ));
        assert!(matches!(
            book.authenticate("").await,
            Err(SessionError::MissingCredential)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_keeps_live_tickets() {
        let book = TicketBook::new(Duration::from_secs(10));
        book.issue(pid(1)).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        let fresh = book.issue(pid(2)).await;
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(book.purge_expired().await, 1);
        assert_eq!(book.len().await, 1);
        assert!(book.revoke(&fresh).await);
    }

    #[tokio::test]
    async fn test_arc_book_is_an_authenticator() {
        let book = std::sync::Arc::new(TicketBook::default());
        let token = book.issue(pid(3)).await;
        assert_eq!(book.authenticate(&token).await.unwrap(), pid(3));
    }
}
