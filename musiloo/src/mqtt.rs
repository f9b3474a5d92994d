//! MQTT subscription delivering sensor payloads to the dispatcher.

use std::time::Duration;

use motion_playback::EventDispatcher;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::{Host, Url};

/// Port used when a plain broker URL names none.
pub const DEFAULT_PORT: u16 = 1883;
/// Port used when a TLS broker URL names none.
pub const DEFAULT_TLS_PORT: u16 = 8883;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 10;

#[derive(Error, Debug)]
pub enum MqttError {
    #[error("Invalid broker address '{address}': {reason}")]
    InvalidBroker { address: String, reason: String },

    #[error("Invalid QoS {0}, expected 0, 1 or 2")]
    InvalidQos(u8),
}

/// Where the broker lives and whether to speak TLS to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl BrokerAddress {
    /// Parse `scheme://host[:port]`.
    ///
    /// `tcp` and `mqtt` are plain, `ssl`, `tls` and `mqtts` use TLS. A bare
    /// `host[:port]` is read as `tcp`. `force_tls` upgrades any scheme.
    pub fn parse(address: &str, force_tls: bool) -> Result<Self, MqttError> {
        let invalid = |reason: &str| MqttError::InvalidBroker {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let url = if address.contains("://") {
            Url::parse(address)
        } else {
            Url::parse(&format!("tcp://{address}"))
        }
        .map_err(|e| invalid(&e.to_string()))?;

        let tls = match url.scheme() {
            "tcp" | "mqtt" => force_tls,
            "ssl" | "tls" | "mqtts" => true,
            other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
        };

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            _ => return Err(invalid("missing host")),
        };

        let port = url
            .port()
            .unwrap_or(if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT });

        Ok(Self { host, port, tls })
    }
}

/// Map the numeric QoS used in configuration.
pub fn parse_qos(level: u8) -> Result<QoS, MqttError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttError::InvalidQos(other)),
    }
}

/// Connection and subscription settings.
#[derive(Clone)]
pub struct MqttConfig {
    pub broker: BrokerAddress,
    pub topic: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: QoS,
}

impl std::fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttConfig")
            .field("broker", &self.broker)
            .field("topic", &self.topic)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("qos", &self.qos)
            .finish_non_exhaustive()
    }
}

impl MqttConfig {
    /// Client options: clean session, 30s keep-alive, credentials when a
    /// username is set, TLS with certificate validation when requested.
    pub fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.broker.host, self.broker.port);
        options.set_keep_alive(KEEP_ALIVE).set_clean_session(true);

        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.clone().unwrap_or_default());
        }
        if self.broker.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }
}

/// A connection to the broker that forwards every publish to an
/// [`EventDispatcher`].
pub struct MqttSubscription {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
    qos: QoS,
}

impl MqttSubscription {
    pub fn new(config: &MqttConfig) -> Self {
        let (client, eventloop) = AsyncClient::new(config.options(), REQUEST_CAPACITY);
        Self {
            client,
            eventloop,
            topic: config.topic.clone(),
            qos: config.qos,
        }
    }

    /// Poll the connection forever.
    ///
    /// The topic is (re)subscribed on every connection acknowledgement.
    /// Connection errors are logged and polling resumes after a second.
    pub async fn run(mut self, dispatcher: &EventDispatcher) {
        info!("Connecting to MQTT broker");
        loop {
            match self.eventloop.poll().await {
                Ok(event) => self.handle_event(event, dispatcher),
                Err(e) => {
                    warn!("MQTT connection error: {}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    fn handle_event(&self, event: Event, dispatcher: &EventDispatcher) {
        match Action::for_event(&event) {
            Action::Subscribe => {
                info!("Connected to MQTT broker, subscribing to '{}'", self.topic);
                if let Err(e) = self.client.try_subscribe(&self.topic, self.qos) {
                    error!("Failed to subscribe to '{}': {}", self.topic, e);
                }
            }
            Action::Deliver { topic, payload } => {
                debug!(topic = %topic, "Received message");
                dispatcher.on_message(payload);
            }
            Action::Ignore => {}
        }
    }
}

/// What the poll loop does with an event.
#[derive(Debug, PartialEq, Eq)]
enum Action<'a> {
    /// A connection was acknowledged, subscribe again
    Subscribe,
    /// Forward a message to the dispatcher
    Deliver { topic: &'a str, payload: &'a [u8] },
    Ignore,
}

impl<'a> Action<'a> {
    fn for_event(event: &'a Event) -> Self {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => Action::Subscribe,
            Event::Incoming(Packet::SubAck(ack)) => {
                debug!("Subscription acknowledged: {:?}", ack.return_codes);
                Action::Ignore
            }
            Event::Incoming(Packet::Publish(publish)) => Action::Deliver {
                topic: &publish.topic,
                payload: &publish.payload,
            },
            _ => Action::Ignore,
        }
    }
}
