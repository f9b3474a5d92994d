//! # Motion Playback
//!
//! Turns motion events into faded playback on a remote Spotify device.
//!
//! - [`DeviceResolver`] picks the device to play on
//! - [`RampEngine`] walks the volume one step at a time and can be cancelled
//!   between steps
//! - [`Orchestrator`] owns the `Idle`/`Playing` state and runs Start and Stop
//! - [`EventDispatcher`] decodes sensor payloads and feeds a single worker
//!   task that owns the orchestrator
//!
//! The remote service is reached through the [`PlaybackService`] trait,
//! implemented for [`spotify_api::SpotifyClient`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use motion_playback::{EventDispatcher, Orchestrator, PlaybackSettings};
//! use spotify_api::{SpotifyClient, Token};
//!
//! # async fn example() {
//! let client = Arc::new(SpotifyClient::new(Token::bearer("access-token")));
//! let settings = PlaybackSettings::default().with_context("spotify:playlist:37i9dQZF1DX4sWSpwq3LiO");
//! let (dispatcher, _worker) = EventDispatcher::spawn(Orchestrator::new(client, settings));
//!
//! dispatcher.on_message(br#"{"motion_detected": true}"#);
//! # }
//! ```

mod device;
mod dispatcher;
mod error;
#[cfg(test)]
mod mock;
mod orchestrator;
mod ramp;
mod service;

pub use device::{DeviceResolver, PlaybackTarget};
pub use dispatcher::{EventDispatcher, MotionEvent};
pub use error::{Operation, PlaybackError, Result};
pub use orchestrator::{Orchestrator, PlaybackSettings, PlaybackState, Transition};
pub use ramp::{RampEngine, RampOutcome, VolumeSteps, MAX_VOLUME};
pub use service::PlaybackService;
