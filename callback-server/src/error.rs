//! Error types for the callback server.

use std::net::SocketAddr;

/// Boxed error returned by [`CodeExchange`](crate::CodeExchange) implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal failures of an authorization handshake.
///
/// Exactly one of these (or a session) is delivered through the handoff.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    /// The `state` query parameter did not match the value issued with the
    /// authorize URL.
    #[error("State mismatch: {received:?} != {expected:?}")]
    StateMismatch {
        /// The value generated when authorization began
        expected: String,
        /// The value carried by the redirect
        received: String,
    },

    /// The user declined the authorization request.
    #[error("Authorization denied: {0}")]
    Denied(String),

    /// The redirect carried neither a code nor an error.
    #[error("Authorization callback is missing the code parameter")]
    MissingCode,

    /// The authorization code could not be exchanged for a session.
    #[error("Couldn't get token: {0}")]
    TokenExchange(#[source] BoxError),

    /// The producer went away without publishing anything.
    #[error("Authorization handoff was dropped before a session was published")]
    Abandoned,
}

/// Errors raised while setting up the callback server itself.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The listener could not be bound.
    #[error("Failed to bind callback server on {addr}: {source}")]
    Bind {
        /// Requested listen address
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_error_display() {
        let error = AuthorizationError::StateMismatch {
            expected: "abc".to_string(),
            received: "xyz".to_string(),
        };
        assert_eq!(error.to_string(), "State mismatch: \"xyz\" != \"abc\"");

        let error = AuthorizationError::TokenExchange("invalid_grant".into());
        assert_eq!(error.to_string(), "Couldn't get token: invalid_grant");

        let error = AuthorizationError::Denied("access_denied".to_string());
        assert!(error.to_string().contains("access_denied"));
    }
}
