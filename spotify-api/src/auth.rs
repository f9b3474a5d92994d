//! Authorization-code flow against the Spotify accounts service.

use std::fmt;

use serde::Deserialize;
use url::Url;

use crate::client::{check_status, SpotifyClient, DEFAULT_API_BASE};
use crate::{ApiError, Result};

/// Default accounts service base URL.
pub const DEFAULT_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

/// Permission scopes requested during authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    UserReadPrivate,
    UserModifyPlaybackState,
    UserReadPlaybackState,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::UserReadPrivate => "user-read-private",
            Scope::UserModifyPlaybackState => "user-modify-playback-state",
            Scope::UserReadPlaybackState => "user-read-playback-state",
        }
    }

    /// Scopes needed to list devices and control playback.
    pub fn playback_control() -> &'static [Scope] {
        &[
            Scope::UserReadPrivate,
            Scope::UserModifyPlaybackState,
            Scope::UserReadPlaybackState,
        ]
    }
}

/// Access token returned by the token endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Token {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    /// Build a bearer token directly (tests, pre-issued tokens).
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in: 0,
            refresh_token: None,
            scope: None,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Lifetime in seconds as reported at issue time.
    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Space separated scopes that were granted.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Drives the authorization-code flow for one registered application.
#[derive(Debug, Clone)]
pub struct Authenticator {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<Scope>,
    accounts_base: String,
    api_base: String,
}

impl Authenticator {
    /// Create an authenticator requesting [`Scope::playback_control`].
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: Scope::playback_control().to_vec(),
            accounts_base: DEFAULT_ACCOUNTS_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_scopes(mut self, scopes: &[Scope]) -> Self {
        self.scopes = scopes.to_vec();
        self
    }

    pub fn with_accounts_base(mut self, base: impl Into<String>) -> Self {
        self.accounts_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Base URL handed to clients created by [`client`](Self::client).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// URL the user must open to grant access. `state` is echoed back on the
    /// redirect and must be checked by the receiver.
    pub fn authorize_url(&self, state: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/authorize", self.accounts_base))?;
        let scope = self
            .scopes
            .iter()
            .map(Scope::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &scope)
            .append_pair("state", state);
        Ok(url)
    }

    /// Exchange an authorization code for a token.
    pub async fn exchange_code(&self, code: &str) -> Result<Token> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.bytes().await?;
        let token: Token =
            serde_json::from_slice(&body).map_err(|e| ApiError::Parse(e.to_string()))?;
        tracing::debug!(?token, "Received access token");
        Ok(token)
    }

    /// Create a Web API client that authenticates with `token`.
    pub fn client(&self, token: Token) -> SpotifyClient {
        SpotifyClient::with_api_base(self.http.clone(), self.api_base.clone(), token)
    }
}
