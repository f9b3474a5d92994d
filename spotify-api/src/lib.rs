//! Minimal Spotify client for motion-triggered playback.
//!
//! Covers exactly what the playback controller needs:
//!
//! - [`Authenticator`]: authorize URL and authorization-code exchange
//! - [`SpotifyClient`]: current user, device listing, play, volume and pause
//!
//! Tokens are not refreshed.

pub mod auth;
pub mod client;
mod error;
pub mod models;

pub use auth::{Authenticator, Scope, Token};
pub use client::SpotifyClient;
pub use error::{ApiError, Result};
pub use models::{playlist_uri, Device, PlayOptions, User};
