//! Error types for the session layer.

/// Errors raised while validating a connect credential.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection request carried no credential at all.
    #[error("missing connect credential")]
    MissingCredential,

    /// The credential was rejected by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The credential was valid once but its lifetime has elapsed.
    #[error("connect credential expired")]
    Expired,
}
