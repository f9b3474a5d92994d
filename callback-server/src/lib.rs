//! Loopback HTTP receiver for OAuth authorization-code redirects.
//!
//! This crate bridges a browser-mediated authorization handshake into a value
//! a long-running process can use. It is provider-agnostic: the code exchange
//! is supplied by the consumer through the [`CodeExchange`] trait.
//!
//! # Overview
//!
//! - [`CallbackServer`]: binds a loopback listener, serves `GET /callback` and
//!   logs every other request.
//! - [`CallbackRouter`]: validates the anti-forgery `state`, runs the code
//!   exchange and publishes the result exactly once.
//! - [`handoff`]: the write-once channel between the request handler and the
//!   task waiting for the session.
//!
//! # Example
//!
//! ```no_run
//! use callback_server::{BoxError, CallbackConfig, CallbackServer, CodeExchange};
//!
//! struct TokenEndpoint;
//!
//! #[async_trait::async_trait]
//! impl CodeExchange for TokenEndpoint {
//!     type Session = String;
//!
//!     async fn exchange(&self, code: &str) -> Result<String, BoxError> {
//!         // POST the code to the provider here
//!         Ok(format!("token-for-{code}"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CallbackConfig {
//!         bind_addr: "127.0.0.1:8080".parse()?,
//!         expected_state: "a-random-state".to_string(),
//!     };
//!
//!     // Returns immediately; the browser redirect completes the handoff.
//!     let (server, pending) = CallbackServer::start(config, TokenEndpoint).await?;
//!     let token = pending.wait().await?;
//!
//!     println!("Authorized: {token}");
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

mod error;
mod handoff;
pub mod router;
mod server;

pub use error::{AuthorizationError, BoxError, CallbackError};
pub use handoff::{handoff, HandoffSender, PendingHandoff};
pub use router::{states_match, CallbackOutcome, CallbackQuery, CallbackRouter, CodeExchange};
pub use server::{CallbackConfig, CallbackServer, CALLBACK_PATH};
