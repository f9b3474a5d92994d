//! Spotify authorization-code login through the loopback callback server.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use callback_server::{
    BoxError, CallbackConfig, CallbackServer, CodeExchange, PendingHandoff, CALLBACK_PATH,
};
use spotify_api::{Authenticator, SpotifyClient};
use tracing::info;
use url::Url;

/// Authorized Spotify client shared by everything after login.
pub type SessionHandle = Arc<SpotifyClient>;

/// Registered Spotify application and where to receive its redirect.
#[derive(Clone)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_addr: SocketAddr,
    pub accounts_base: Option<String>,
    pub api_base: Option<String>,
}

impl AuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        callback_addr: SocketAddr,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            callback_addr,
            accounts_base: None,
            api_base: None,
        }
    }

    /// Redirect URI registered with Spotify.
    pub fn redirect_uri(&self) -> String {
        format!("http://{}/{CALLBACK_PATH}", self.callback_addr)
    }

    fn authenticator(&self, redirect_uri: &str) -> Authenticator {
        let mut authenticator =
            Authenticator::new(&self.client_id, &self.client_secret, redirect_uri);
        if let Some(base) = &self.accounts_base {
            authenticator = authenticator.with_accounts_base(base);
        }
        if let Some(base) = &self.api_base {
            authenticator = authenticator.with_api_base(base);
        }
        authenticator
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("callback_addr", &self.callback_addr)
            .finish_non_exhaustive()
    }
}

/// Turns the redirected code into a [`SessionHandle`].
pub struct SpotifyExchange {
    authenticator: Authenticator,
}

impl SpotifyExchange {
    pub fn new(authenticator: Authenticator) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl CodeExchange for SpotifyExchange {
    type Session = SessionHandle;

    async fn exchange(&self, code: &str) -> Result<SessionHandle, BoxError> {
        let token = self.authenticator.exchange_code(code).await?;
        Ok(Arc::new(self.authenticator.client(token)))
    }
}

/// A login in progress: the listener is up and waiting for the redirect.
pub struct PendingAuthorization {
    server: CallbackServer,
    pending: PendingHandoff<SessionHandle>,
    authorize_url: Url,
}

impl PendingAuthorization {
    /// URL the operator has to open.
    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn callback_url(&self) -> String {
        self.server.callback_url()
    }
}

/// Start the callback listener and log the URL to open.
///
/// Returns once the listener is bound. A fresh anti-forgery state is drawn
/// for every call.
pub async fn begin_authorization(config: &AuthConfig) -> Result<PendingAuthorization> {
    let state = uuid::Uuid::new_v4().to_string();
    let callback = CallbackConfig {
        bind_addr: config.callback_addr,
        expected_state: state.clone(),
    };

    let (server, pending) = CallbackServer::start_with(callback, |callback_url| {
        SpotifyExchange::new(config.authenticator(callback_url))
    })
    .await
    .context("Failed to start the callback server")?;

    let authorize_url = match config
        .authenticator(&server.callback_url())
        .authorize_url(&state)
    {
        Ok(url) => url,
        Err(e) => {
            server.shutdown().await;
            return Err(e).context("Failed to build the authorize URL");
        }
    };

    info!("Please log in to Spotify by visiting the following page in your browser:");
    info!("{}", authorize_url);

    Ok(PendingAuthorization {
        server,
        pending,
        authorize_url,
    })
}

/// Wait for the redirect, verify the session and close the listener.
pub async fn await_session_handle(authorization: PendingAuthorization) -> Result<SessionHandle> {
    let PendingAuthorization {
        server, pending, ..
    } = authorization;

    let session = match pending.wait().await {
        Ok(session) => session,
        Err(e) => {
            server.shutdown().await;
            return Err(e).context("Spotify authorization failed");
        }
    };

    let user = session.current_user().await;
    server.shutdown().await;
    let user = user.context("Failed to fetch the logged in user")?;

    info!("You are logged in as: {}", user.id);
    Ok(session)
}
