use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::auth::Token;
use crate::models::{Device, DeviceList, ErrorBody, PlayOptions, User};
use crate::{ApiError, Result};

/// Default Web API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

/// An authorized client for the Spotify Web API.
///
/// The client carries the access token obtained during authorization and
/// is meant to be shared (behind an `Arc`) by everything that acts on the
/// user's behalf. Tokens are not refreshed.
///
/// ```rust,no_run
/// # async fn example(client: spotify_api::SpotifyClient) -> spotify_api::Result<()> {
/// let devices = client.devices().await?;
/// if let Some(id) = devices.first().and_then(|d| d.id.as_deref()) {
///     client.set_volume(40, Some(id)).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    api_base: String,
    token: Token,
}

impl SpotifyClient {
    /// Create a client against the public Web API.
    pub fn new(token: Token) -> Self {
        Self::with_api_base(reqwest::Client::new(), DEFAULT_API_BASE, token)
    }

    /// Create a client against a custom base URL (used by tests).
    pub fn with_api_base(http: reqwest::Client, api_base: impl Into<String>, token: Token) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// The token this client authenticates with.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Fetch the profile of the authorized user.
    pub async fn current_user(&self) -> Result<User> {
        let response = self.send(self.request(Method::GET, "/me")).await?;
        Self::json(response).await
    }

    /// List the devices currently available for playback, in Spotify's order.
    pub async fn devices(&self) -> Result<Vec<Device>> {
        let response = self
            .send(self.request(Method::GET, "/me/player/devices"))
            .await?;
        let list: DeviceList = Self::json(response).await?;
        Ok(list.devices)
    }

    /// Start or resume playback.
    pub async fn play(&self, device_id: Option<&str>, options: &PlayOptions) -> Result<()> {
        let request = self
            .request(Method::PUT, "/me/player/play")
            .query(&device_query(device_id))
            .json(options);
        self.send(request).await?;
        Ok(())
    }

    /// Set the volume in percent. Values above 100 are clamped.
    pub async fn set_volume(&self, percent: u8, device_id: Option<&str>) -> Result<()> {
        let mut query = vec![("volume_percent", percent.min(100).to_string())];
        query.extend(device_query(device_id));

        let request = self
            .request(Method::PUT, "/me/player/volume")
            .query(&query)
            .header(reqwest::header::CONTENT_LENGTH, 0);
        self.send(request).await?;
        Ok(())
    }

    /// Pause playback.
    pub async fn pause(&self, device_id: Option<&str>) -> Result<()> {
        let request = self
            .request(Method::PUT, "/me/player/pause")
            .query(&device_query(device_id))
            .header(reqwest::header::CONTENT_LENGTH, 0);
        self.send(request).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(self.token.access_token())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        check_status(response).await
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

fn device_query(device_id: Option<&str>) -> Vec<(&'static str, String)> {
    device_id
        .map(|id| vec![("device_id", id.to_string())])
        .unwrap_or_default()
}

/// Turn a non-success response into [`ApiError::Status`], keeping Spotify's
/// own message when the body carries one.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(ErrorBody::into_message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body
            }
        });

    tracing::debug!(status = status.as_u16(), %message, "Spotify request failed");
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}
