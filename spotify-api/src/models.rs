//! Wire types for the Spotify endpoints this crate talks to.

use serde::{Deserialize, Serialize};

/// An output device as reported by `GET /me/player/devices`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    /// Device id. Restricted devices may be reported without one.
    pub id: Option<String>,
    /// Human readable name
    pub name: String,
    /// Whether this is the currently active device
    #[serde(default)]
    pub is_active: bool,
    /// Whether the device refuses Web API commands
    #[serde(default)]
    pub is_restricted: bool,
    /// Device type ("Computer", "Smartphone", "Speaker", ...)
    #[serde(rename = "type", default)]
    pub device_type: String,
    /// Current volume, if the device reports it
    pub volume_percent: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceList {
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// The authorized user (`GET /me`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: Option<String>,
}

/// Body of `PUT /me/player/play`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayOptions {
    /// Album, artist or playlist to play
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,
    /// Explicit track list, used when no context is given
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,
}

impl PlayOptions {
    /// Resume whatever the device was playing.
    pub fn resume() -> Self {
        Self::default()
    }

    /// Play the given context (e.g. `spotify:playlist:...`).
    pub fn context(uri: impl Into<String>) -> Self {
        Self {
            context_uri: Some(uri.into()),
            uris: Vec::new(),
        }
    }
}

/// Build the context URI for a playlist id.
pub fn playlist_uri(playlist_id: &str) -> String {
    format!("spotify:playlist:{playlist_id}")
}

/// Error envelopes used by the accounts service and the Web API.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorBody {
    Api { error: ApiErrorObject },
    Accounts {
        error: String,
        error_description: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorObject {
    pub message: String,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> String {
        match self {
            Self::Api { error } => error.message,
            Self::Accounts {
                error,
                error_description: Some(description),
            } => format!("{error}: {description}"),
            Self::Accounts { error, .. } => error,
        }
    }
}
