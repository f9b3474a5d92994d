//! The seam between the controller and the remote playback service.

use async_trait::async_trait;
use spotify_api::{ApiError, Device, PlayOptions, SpotifyClient};

/// Remote playback operations the controller relies on.
///
/// [`SpotifyClient`] is the production implementation; tests substitute a
/// recording fake.
#[async_trait]
pub trait PlaybackService: Send + Sync + 'static {
    /// List available output devices in the service's order.
    async fn devices(&self) -> Result<Vec<Device>, ApiError>;

    /// Begin playback on `device_id`, optionally switching to `context_uri`.
    async fn play(&self, device_id: &str, context_uri: Option<&str>) -> Result<(), ApiError>;

    /// Set the volume in percent.
    async fn set_volume(&self, percent: u8, device_id: Option<&str>) -> Result<(), ApiError>;

    /// Pause playback.
    async fn pause(&self, device_id: Option<&str>) -> Result<(), ApiError>;
}

#[async_trait]
impl PlaybackService for SpotifyClient {
    async fn devices(&self) -> Result<Vec<Device>, ApiError> {
        SpotifyClient::devices(self).await
    }

    async fn play(&self, device_id: &str, context_uri: Option<&str>) -> Result<(), ApiError> {
        let options = context_uri.map_or_else(PlayOptions::resume, PlayOptions::context);
        SpotifyClient::play(self, Some(device_id), &options).await
    }

    async fn set_volume(&self, percent: u8, device_id: Option<&str>) -> Result<(), ApiError> {
        SpotifyClient::set_volume(self, percent, device_id).await
    }

    async fn pause(&self, device_id: Option<&str>) -> Result<(), ApiError> {
        SpotifyClient::pause(self, device_id).await
    }
}
