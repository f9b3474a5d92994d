//! HTTP server receiving the authorization redirect.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::stream;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use warp::http::StatusCode;
use warp::Filter;
use warp::Reply;

use crate::error::CallbackError;
use crate::handoff::{handoff, PendingHandoff};
use crate::router::{CallbackQuery, CallbackRouter, CodeExchange};

/// Path segment of the redirect endpoint.
pub const CALLBACK_PATH: &str = "callback";

/// Settings for a [`CallbackServer`].
#[derive(Debug, Clone)]
pub struct CallbackConfig {
    /// Loopback address to listen on. Port 0 picks a free port.
    pub bind_addr: SocketAddr,
    /// Anti-forgery value the redirect must echo back
    pub expected_state: String,
}

/// Loopback HTTP server for a single authorization handshake.
///
/// Serves `GET /callback` and logs every other request. The first redirect
/// that reaches `/callback` decides the result published on the handoff
/// returned by [`CallbackServer::start`].
///
/// # Example
///
/// ```no_run
/// use callback_server::{BoxError, CallbackConfig, CallbackServer, CodeExchange};
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl CodeExchange for Echo {
///     type Session = String;
///     async fn exchange(&self, code: &str) -> Result<String, BoxError> {
///         Ok(code.to_string())
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = CallbackConfig {
///         bind_addr: "127.0.0.1:8080".parse()?,
///         expected_state: "state-token".to_string(),
///     };
///     let (server, pending) = CallbackServer::start(config, Echo).await?;
///     println!("Redirect to {}", server.callback_url());
///
///     let session = pending.wait().await?;
///     println!("Got session {session}");
///     server.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct CallbackServer {
    /// The address the listener is bound to
    local_addr: SocketAddr,
    /// Shutdown signal sender
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Server task handle
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind the listener and start serving.
    ///
    /// Returns as soon as the listener is bound; the returned
    /// [`PendingHandoff`] resolves once a redirect has been routed.
    ///
    /// Dropping the server without calling [`shutdown`](Self::shutdown)
    /// also stops the listener.
    pub async fn start<E: CodeExchange>(
        config: CallbackConfig,
        exchange: E,
    ) -> Result<(Self, PendingHandoff<E::Session>), CallbackError> {
        Self::start_with(config, |_| exchange).await
    }

    /// Like [`start`](Self::start), but builds the exchange from the URL of
    /// the bound redirect endpoint. Needed when the bind address uses port 0
    /// and the provider must be told the real redirect URI.
    pub async fn start_with<E, F>(
        config: CallbackConfig,
        make_exchange: F,
    ) -> Result<(Self, PendingHandoff<E::Session>), CallbackError>
    where
        E: CodeExchange,
        F: FnOnce(&str) -> E,
    {
        let bind_error = |source| CallbackError::Bind {
            addr: config.bind_addr,
            source,
        };
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let exchange = make_exchange(&callback_url(local_addr));
        let (sender, pending) = handoff();
        let router = Arc::new(CallbackRouter::new(config.expected_state, exchange, sender));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let incoming = stream::unfold(listener, |listener| async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => return Some((Ok::<_, std::io::Error>(stream), listener)),
                    Err(e) => tracing::warn!("Failed to accept callback connection: {e}"),
                }
            }
        });
        let server = warp::serve(Self::routes(router)).serve_incoming_with_graceful_shutdown(
            incoming,
            async move {
                let _ = shutdown_rx.await;
            },
        );

        tracing::info!("Callback server listening on {local_addr}");
        let server_handle = tokio::spawn(server);

        Ok((
            Self {
                local_addr,
                shutdown_tx: Some(shutdown_tx),
                server_handle: Some(server_handle),
            },
            pending,
        ))
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Full URL of the redirect endpoint.
    pub fn callback_url(&self) -> String {
        callback_url(self.local_addr)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.server_handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Callback server task ended abnormally: {e}");
            }
        }
        tracing::debug!("Callback server on {} stopped", self.local_addr);
    }

    fn routes<E: CodeExchange>(
        router: Arc<CallbackRouter<E>>,
    ) -> impl Filter<Extract = (warp::reply::Response,)> + Clone + Send + Sync + 'static {
        let callback_route = warp::get()
            .and(warp::path(CALLBACK_PATH))
            .and(warp::path::end())
            .and(warp::query::<CallbackQuery>())
            .and_then(move |query: CallbackQuery| {
                let router = router.clone();
                async move {
                    let outcome = router.route_callback(query).await;
                    Ok::<_, Infallible>(outcome.into_response())
                }
            });

        let catch_all = warp::method()
            .and(warp::path::full())
            .map(|method: warp::http::Method, path: warp::path::FullPath| {
                tracing::info!("Received request at: {} {}", method, path.as_str());
                warp::reply::with_status("Not found", StatusCode::NOT_FOUND).into_response()
            });

        callback_route.or(catch_all).unify()
    }
}

fn callback_url(addr: SocketAddr) -> String {
    format!("http://{addr}/{CALLBACK_PATH}")
}
