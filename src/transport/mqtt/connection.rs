//! Pure connection state management for MQTT client
//!
//! This module contains pure functions for connection state management,
//! reconnect policy and broker option building.

use crate::config::BrokerSection;
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Connection state for MQTT client
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Initial state - attempting to connect
    Connecting,
    /// ConnAck received, ready to publish and subscribe
    Connected,
    /// Link lost with reason, waiting out the reconnect delay
    Disconnected(String),
    /// Reconnect attempt in progress (attempt count)
    Reconnecting(u32),
    /// Torn down by the owner; terminal
    Closed,
}

/// Reconnection policy: a fixed delay, retried forever
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay between losing the link and the next attempt, in milliseconds
    pub delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self { delay_ms: 3000 }
    }
}

impl ReconnectConfig {
    pub fn from_broker(config: &BrokerSection) -> Self {
        Self {
            delay_ms: config.reconnect_delay_ms,
        }
    }

    /// Delay before the given attempt; the same for every attempt
    pub fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Subscription failed")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
    #[error("Connection already started")]
    AlreadyStarted,
}

/// Unique client id per connection attempt so a reconnect never collides
/// with the broker's record of the previous link
pub fn generate_client_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// Build MQTT options from broker config
/// Shared by the initial connection and every reconnect
pub fn configure_mqtt_options(
    client_id_prefix: &str,
    config: &BrokerSection,
) -> Result<MqttOptions, MqttError> {
    let url = Url::parse(&config.broker_url)
        .map_err(|_| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;

    let tls = match url.scheme() {
        "mqtt" => false,
        "mqtts" => true,
        _ => return Err(MqttError::InvalidBrokerUrl(config.broker_url.clone())),
    };

    let host = url
        .host_str()
        .ok_or_else(|| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;
    let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

    let mut mqtt_options = MqttOptions::new(generate_client_id(client_id_prefix), host, port);

    if tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some(username) = config.username() {
        let password = config.password().unwrap_or_default();
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    Ok(mqtt_options)
}
