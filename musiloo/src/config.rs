//! Command line and environment configuration.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use motion_playback::{PlaybackSettings, MAX_VOLUME};
use thiserror::Error;
use tracing::info;

use crate::auth::AuthConfig;
use crate::mqtt::{parse_qos, BrokerAddress, MqttConfig};

const FALLBACK_CLIENT_ID: &str = "musiloo";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Musiloo
///
/// Plays a Spotify playlist while a motion sensor reports activity and fades
/// it out once the room is empty again.
#[derive(Parser, Debug, Clone)]
#[command(name = "musiloo")]
#[command(about = "Motion-triggered Spotify playback over MQTT")]
#[command(version)]
pub struct Args {
    /// MQTT broker URL (tcp://, mqtt://, ssl://, tls:// or mqtts://)
    #[arg(long, env = "MQTT_SERVER", default_value = "tcp://127.0.0.1:1883")]
    pub mqtt_server: String,

    /// Topic filter carrying motion events
    #[arg(long, env = "MQTT_TOPIC", default_value = "#")]
    pub mqtt_topic: String,

    /// MQTT client id (defaults to the host name)
    #[arg(long, env = "MQTT_CLIENT_ID")]
    pub mqtt_client_id: Option<String>,

    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    /// Subscription QoS (0, 1 or 2)
    #[arg(long, env = "MQTT_QOS", default_value_t = 0)]
    pub mqtt_qos: u8,

    /// Use TLS regardless of the broker URL scheme
    #[arg(long, env = "MQTT_TLS")]
    pub mqtt_tls: bool,

    /// Spotify application client id
    #[arg(long, env = "SPOTIFY_ID")]
    pub spotify_id: Option<String>,

    /// Spotify application client secret
    #[arg(long, env = "SPOTIFY_SECRET", hide_env_values = true)]
    pub spotify_secret: Option<String>,

    /// Playlist played when motion is detected
    #[arg(long, env = "SPOTIFY_PLAYLIST_ID")]
    pub spotify_playlist_id: Option<String>,

    /// Address of the login callback listener
    #[arg(long, env = "MUSILOO_CALLBACK_ADDR", default_value = "127.0.0.1:8080")]
    pub callback_addr: SocketAddr,

    /// Volume a fade-in starts at
    #[arg(long, env = "MUSILOO_VOLUME_FLOOR", default_value_t = 20)]
    pub volume_floor: u8,

    /// Volume a fade-in ends at
    #[arg(long, env = "MUSILOO_VOLUME_CEILING", default_value_t = 75)]
    pub volume_ceiling: u8,

    /// Delay between volume steps in milliseconds
    #[arg(long, env = "MUSILOO_STEP_DELAY_MS", default_value_t = 20)]
    pub step_delay_ms: u64,

    /// Load the playlist muted and paused right after login
    #[arg(long, env = "MUSILOO_PRIME_ON_START")]
    pub prime_on_start: bool,

    /// Log filter, a level or directives like `musiloo=debug,rumqttc=warn`;
    /// RUST_LOG takes precedence
    #[arg(long, env = "MUSILOO_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "MUSILOO_LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    /// Check value ranges that clap cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("MUSILOO_VOLUME_FLOOR", self.volume_floor),
            ("MUSILOO_VOLUME_CEILING", self.volume_ceiling),
        ] {
            if value > MAX_VOLUME {
                return Err(ConfigError::Invalid {
                    name,
                    reason: format!("{value} is above {MAX_VOLUME}"),
                });
            }
        }

        if self.volume_floor > self.volume_ceiling {
            return Err(ConfigError::Invalid {
                name: "MUSILOO_VOLUME_FLOOR",
                reason: format!(
                    "floor ({}) is above ceiling ({})",
                    self.volume_floor, self.volume_ceiling
                ),
            });
        }

        tracing_subscriber::EnvFilter::try_new(&self.log_level)
            .map(|_| ())
            .map_err(|e| ConfigError::Invalid {
                name: "MUSILOO_LOG_LEVEL",
                reason: format!("'{}': {}", self.log_level, e),
            })
    }
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub auth: AuthConfig,
    pub playlist_id: String,
    pub playback: PlaybackSettings,
    pub prime_on_start: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        args.validate()?;

        let client_id = set(args.spotify_id).ok_or(ConfigError::Missing("SPOTIFY_ID"))?;
        let client_secret =
            set(args.spotify_secret).ok_or(ConfigError::Missing("SPOTIFY_SECRET"))?;
        let playlist_id =
            set(args.spotify_playlist_id).ok_or(ConfigError::Missing("SPOTIFY_PLAYLIST_ID"))?;

        let broker = BrokerAddress::parse(&args.mqtt_server, args.mqtt_tls).map_err(|e| {
            ConfigError::Invalid {
                name: "MQTT_SERVER",
                reason: e.to_string(),
            }
        })?;
        let qos = parse_qos(args.mqtt_qos).map_err(|e| ConfigError::Invalid {
            name: "MQTT_QOS",
            reason: e.to_string(),
        })?;
        let username = set(args.mqtt_username);
        let password = username.as_ref().and(set(args.mqtt_password));

        let mqtt = MqttConfig {
            broker,
            topic: args.mqtt_topic,
            client_id: set(args.mqtt_client_id)
                .or_else(hostname)
                .unwrap_or_else(|| FALLBACK_CLIENT_ID.to_string()),
            username,
            password,
            qos,
        };

        let playback = PlaybackSettings {
            floor: args.volume_floor,
            ceiling: args.volume_ceiling,
            step_delay: Duration::from_millis(args.step_delay_ms),
            ..PlaybackSettings::default()
        }
        .with_context(spotify_api::playlist_uri(&playlist_id));

        Ok(Self {
            mqtt,
            auth: AuthConfig::new(client_id, client_secret, args.callback_addr),
            playlist_id,
            playback,
            prime_on_start: args.prime_on_start,
            log_level: args.log_level,
            log_json: args.log_json,
        })
    }
}

impl Config {
    /// Parse the command line, falling back to the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::try_from(Args::parse())
    }

    pub fn print_summary(&self) {
        let broker = &self.mqtt.broker;
        info!("Configuration:");
        info!(
            "  MQTT broker: {}:{}{}",
            broker.host,
            broker.port,
            if broker.tls { " (TLS)" } else { "" }
        );
        info!("  MQTT topic: {} (QoS {:?})", self.mqtt.topic, self.mqtt.qos);
        info!("  MQTT client id: {}", self.mqtt.client_id);
        if let Some(username) = &self.mqtt.username {
            info!("  MQTT username: {}", username);
        }
        info!("  Spotify redirect URI: {}", self.auth.redirect_uri());
        info!("  Playlist: {}", self.playlist_id);
        info!(
            "  Volume: {} -> {} in steps of {}ms",
            self.playback.floor,
            self.playback.ceiling,
            self.playback.step_delay.as_millis()
        );
        info!("  Prime on start: {}", self.prime_on_start);
        info!("  Log level: {}", self.log_level);
    }
}

/// Treat empty values like unset ones.
fn set(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// The OS host name, then `$HOSTNAME`.
fn hostname() -> Option<String> {
    set(gethostname::gethostname().into_string().ok()).or_else(|| set(std::env::var("HOSTNAME").ok()))
}
