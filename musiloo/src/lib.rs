//! Wiring for the musiloo daemon: configuration, the Spotify authorization
//! bridge and the MQTT subscription feeding motion events to
//! [`motion_playback::EventDispatcher`].

pub mod auth;
pub mod config;
pub mod mqtt;

pub use auth::{await_session_handle, begin_authorization, AuthConfig, PendingAuthorization, SessionHandle};
pub use config::{Args, Config, ConfigError};
pub use mqtt::{BrokerAddress, MqttConfig, MqttError, MqttSubscription};
