//! Routing of authorization redirects into the pending handoff.
//!
//! The [`CallbackRouter`] owns the producer half of a handoff. The first
//! redirect that reaches it decides the outcome of the whole handshake:
//! either a session is published or a terminal [`AuthorizationError`] is.
//! Every later redirect is answered without touching the handoff.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use warp::http::StatusCode;
use warp::Reply;

use crate::error::{AuthorizationError, BoxError};
use crate::handoff::HandoffSender;

/// Query parameters of an authorization-code redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code issued by the provider
    pub code: Option<String>,
    /// Anti-forgery value echoed back by the provider
    pub state: Option<String>,
    /// Error code when the user declined
    pub error: Option<String>,
}

/// Exchanges an authorization code for a usable session.
///
/// Implemented by the consuming crate for its provider; the callback server
/// has no knowledge of the token endpoint.
#[async_trait]
pub trait CodeExchange: Send + Sync + 'static {
    /// Session produced by a successful exchange
    type Session: Send + 'static;

    /// Exchange `code` for a session.
    async fn exchange(&self, code: &str) -> Result<Self::Session, BoxError>;
}

/// Result of routing a single redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// A session was published
    Completed,
    /// The handoff was consumed by an earlier redirect
    AlreadyCompleted,
    /// The `state` parameter did not match
    StateMismatch,
    /// The provider reported that the user declined
    Denied,
    /// No code was present
    MissingCode,
    /// The code exchange failed
    ExchangeFailed,
}

impl CallbackOutcome {
    /// HTTP status reported to the browser.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Completed => StatusCode::OK,
            Self::AlreadyCompleted => StatusCode::CONFLICT,
            Self::StateMismatch => StatusCode::NOT_FOUND,
            Self::Denied | Self::ExchangeFailed => StatusCode::FORBIDDEN,
            Self::MissingCode => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::Completed => "Login Completed!",
            Self::AlreadyCompleted => "Authorization already completed",
            Self::StateMismatch => "Not found",
            Self::Denied => "Authorization denied",
            Self::MissingCode => "Missing authorization code",
            Self::ExchangeFailed => "Couldn't get token",
        }
    }

    /// Render the outcome as the single page the operator sees.
    pub fn into_response(self) -> warp::reply::Response {
        match self {
            Self::Completed => warp::reply::html(
                "<!DOCTYPE html><html><head><title>musiloo</title></head>\
                 <body><h1>Login Completed!</h1>\
                 <p>You can close this window.</p></body></html>",
            )
            .into_response(),
            other => warp::reply::with_status(other.message(), other.status()).into_response(),
        }
    }
}

/// Byte-for-byte comparison of the issued and echoed state values.
pub fn states_match(expected: &str, received: Option<&str>) -> bool {
    received.is_some_and(|received| received.as_bytes() == expected.as_bytes())
}

/// Decides the outcome of redirects and publishes it once.
pub struct CallbackRouter<E: CodeExchange> {
    expected_state: String,
    exchange: E,
    sender: Mutex<Option<HandoffSender<E::Session>>>,
}

impl<E: CodeExchange> CallbackRouter<E> {
    /// Create a router that validates against `expected_state` and publishes
    /// into `sender`.
    pub fn new(
        expected_state: impl Into<String>,
        exchange: E,
        sender: HandoffSender<E::Session>,
    ) -> Self {
        Self {
            expected_state: expected_state.into(),
            exchange,
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Whether the handoff is still waiting for a redirect.
    pub async fn is_pending(&self) -> bool {
        self.sender.lock().await.is_some()
    }

    /// Route one redirect.
    ///
    /// The producer half is taken before anything else, so concurrent or
    /// repeated redirects can never publish a second value.
    pub async fn route_callback(&self, query: CallbackQuery) -> CallbackOutcome {
        let Some(sender) = self.sender.lock().await.take() else {
            tracing::warn!("Ignoring authorization callback, handoff already completed");
            return CallbackOutcome::AlreadyCompleted;
        };

        if !states_match(&self.expected_state, query.state.as_deref()) {
            let received = query.state.unwrap_or_default();
            tracing::error!(
                expected = %self.expected_state,
                received = %received,
                "State mismatch on authorization callback"
            );
            sender.fail(AuthorizationError::StateMismatch {
                expected: self.expected_state.clone(),
                received,
            });
            return CallbackOutcome::StateMismatch;
        }

        if let Some(reason) = query.error {
            tracing::error!(reason = %reason, "Authorization was denied");
            sender.fail(AuthorizationError::Denied(reason));
            return CallbackOutcome::Denied;
        }

        let Some(code) = query.code else {
            tracing::error!("Authorization callback carried no code");
            sender.fail(AuthorizationError::MissingCode);
            return CallbackOutcome::MissingCode;
        };

        match self.exchange.exchange(&code).await {
            Ok(session) => {
                tracing::info!("Authorization code exchanged, publishing session");
                if !sender.publish(session) {
                    tracing::warn!("Session published but nobody is waiting for it");
                }
                CallbackOutcome::Completed
            }
            Err(e) => {
                tracing::error!(error = %e, "Couldn't get token");
                sender.fail(AuthorizationError::TokenExchange(e));
                CallbackOutcome::ExchangeFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::handoff;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingExchange {
        calls: Arc<AtomicU32>,
        fail: bool,
    }

    #[async_trait]
    impl CodeExchange for CountingExchange {
        type Session = String;

        async fn exchange(&self, code: &str) -> Result<String, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("invalid_grant".into())
            } else {
                Ok(format!("session-for-{code}"))
            }
        }
    }

    fn query(code: Option<&str>, state: Option<&str>) -> CallbackQuery {
        CallbackQuery {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: None,
        }
    }

    fn new_router(fail: bool) -> (
        CallbackRouter<CountingExchange>,
        crate::PendingHandoff<String>,
        Arc<AtomicU32>,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let (sender, pending) = handoff();
        let exchange = CountingExchange {
            calls: Arc::clone(&calls),
            fail,
        };
        (CallbackRouter::new("expected", exchange, sender), pending, calls)
    }

    #[tokio::test]
    async fn test_route_valid_callback() {
        let (router, pending, calls) = new_router(false);

        let outcome = router
            .route_callback(query(Some("abc"), Some("expected")))
            .await;

        assert_eq!(outcome, CallbackOutcome::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pending.wait().await.unwrap(), "session-for-abc");
        assert!(!router.is_pending().await);
    }

    #[tokio::test]
    async fn test_state_mismatch_skips_exchange() {
        let (router, pending, calls) = new_router(false);

        let outcome = router
            .route_callback(query(Some("abc"), Some("forged")))
            .await;

        assert_eq!(outcome, CallbackOutcome::StateMismatch);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            pending.wait().await,
            Err(AuthorizationError::StateMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_state_is_mismatch() {
        let (router, pending, _calls) = new_router(false);

        let outcome = router.route_callback(query(Some("abc"), None)).await;

        assert_eq!(outcome, CallbackOutcome::StateMismatch);
        assert!(pending.wait().await.is_err());
    }

    #[tokio::test]
    async fn test_exchange_failure() {
        let (router, pending, calls) = new_router(true);

        let outcome = router
            .route_callback(query(Some("abc"), Some("expected")))
            .await;

        assert_eq!(outcome, CallbackOutcome::ExchangeFailed);
        assert_eq!(outcome.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            pending.wait().await,
            Err(AuthorizationError::TokenExchange(_))
        ));
    }

    #[tokio::test]
    async fn test_denied_and_missing_code() {
        let (router, pending, _) = new_router(false);
        let outcome = router
            .route_callback(CallbackQuery {
                code: None,
                state: Some("expected".to_string()),
                error: Some("access_denied".to_string()),
            })
            .await;
        assert_eq!(outcome, CallbackOutcome::Denied);
        assert!(matches!(pending.wait().await, Err(AuthorizationError::Denied(_))));

        let (router, pending, _) = new_router(false);
        let outcome = router.route_callback(query(None, Some("expected"))).await;
        assert_eq!(outcome, CallbackOutcome::MissingCode);
        assert!(matches!(pending.wait().await, Err(AuthorizationError::MissingCode)));
    }

    #[tokio::test]
    async fn test_second_callback_is_rejected() {
        let (router, _pending, calls) = new_router(false);

        router
            .route_callback(query(Some("first"), Some("expected")))
            .await;
        let outcome = router
            .route_callback(query(Some("second"), Some("expected")))
            .await;

        assert_eq!(outcome, CallbackOutcome::AlreadyCompleted);
        assert_eq!(outcome.status(), StatusCode::CONFLICT);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #[test]
        fn prop_only_identical_state_matches(expected in "[a-zA-Z0-9-]{1,40}", other in "[a-zA-Z0-9-]{0,40}") {
            prop_assert!(states_match(&expected, Some(&expected)));
            prop_assert_eq!(states_match(&expected, Some(&other)), expected == other);
            prop_assert!(!states_match(&expected, None));
        }
    }
}
