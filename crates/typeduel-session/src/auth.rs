//! Authentication hook for validating player identity.
//!
//! typeduel does not issue credentials. The account service hands the
//! browser a short-lived ticket and the browser presents it in the
//! WebSocket URL. The server only has to turn that ticket back into a
//! [`PlayerId`], which is what the [`Authenticator`] trait does.

use std::sync::Arc;

use typeduel_protocol::PlayerId;

use crate::SessionError;

/// Validates a connect credential and returns the player's identity.
///
/// # Example
///
/// ```rust
/// use typeduel_protocol::PlayerId;
/// use typeduel_session::{Authenticator, SessionError};
///
/// /// Treats the credential as a numeric user id. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<PlayerId, SessionError> {
///         let id: u64 = token
///             .parse()
///             .map_err(|_| SessionError::AuthFailed("token must be a number".into()))?;
///         Ok(PlayerId(id))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given credential and returns the player's identity.
    ///
    /// Called once per connection, before the connection is registered
    /// with any lobby.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<PlayerId, SessionError>> + Send;
}

impl<A: Authenticator> Authenticator for Arc<A> {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<PlayerId, SessionError>> + Send {
        (**self).authenticate(token)
    }
}
