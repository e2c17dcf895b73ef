//! Configuration system for the chat session client
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a client that dials `mqtt://localhost:1883` with the standard
//! chat topics.

use crate::protocol::topics::{DESTINATION_PREFIX, MESSAGES_TOPIC, TYPING_TOPIC, USERS_TOPIC};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Main client configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub topics: TopicsSection,
}

/// Client identity settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// Prefix of the MQTT client id (must match [a-zA-Z0-9._-]+)
    #[serde(default = "default_client_id_prefix")]
    pub id_prefix: String,
    /// Display name announced after connecting (optional)
    pub display_name: Option<String>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            id_prefix: default_client_id_prefix(),
            display_name: None,
        }
    }
}

fn default_client_id_prefix() -> String {
    "neochat".to_string()
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker URL with protocol and port (`mqtt://` or `mqtts://`)
    #[serde(default = "default_broker_url")]
    pub broker_url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// MQTT keep alive in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Fixed delay between losing the link and the next connection attempt
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            broker_url: default_broker_url(),
            username_env: None,
            password_env: None,
            keep_alive_secs: default_keep_alive(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

fn default_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_reconnect_delay() -> u64 {
    3000
}

impl BrokerSection {
    /// Username resolved from the configured environment variable
    pub fn username(&self) -> Option<String> {
        get_env_var_optional(self.username_env.as_ref())
    }

    /// Password resolved from the configured environment variable
    pub fn password(&self) -> Option<String> {
        get_env_var_optional(self.password_env.as_ref())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Local session behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    /// Quiet period after which the typing indicator clears
    #[serde(default = "default_typing_expiry")]
    pub typing_expiry_ms: u64,
    /// Minimum spacing between outbound typing notifications (0 = every keystroke)
    #[serde(default)]
    pub typing_throttle_ms: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            typing_expiry_ms: default_typing_expiry(),
            typing_throttle_ms: 0,
        }
    }
}

fn default_typing_expiry() -> u64 {
    1500
}

/// Topic layout on the broker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicsSection {
    #[serde(default = "default_messages_topic")]
    pub messages: String,
    #[serde(default = "default_users_topic")]
    pub users: String,
    #[serde(default = "default_typing_topic")]
    pub typing: String,
    #[serde(default = "default_destination_prefix")]
    pub destination_prefix: String,
}

impl Default for TopicsSection {
    fn default() -> Self {
        Self {
            messages: default_messages_topic(),
            users: default_users_topic(),
            typing: default_typing_topic(),
            destination_prefix: default_destination_prefix(),
        }
    }
}

fn default_messages_topic() -> String {
    MESSAGES_TOPIC.to_string()
}

fn default_users_topic() -> String {
    USERS_TOPIC.to_string()
}

fn default_typing_topic() -> String {
    TYPING_TOPIC.to_string()
}

fn default_destination_prefix() -> String {
    DESTINATION_PREFIX.to_string()
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid client id prefix: {0}")]
    InvalidClientId(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChatConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ChatConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_client_id_prefix(&self.client.id_prefix)?;
        validate_broker_url(&self.broker.broker_url)?;

        if self.broker.reconnect_delay_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "broker.reconnect_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.session.typing_expiry_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "session.typing_expiry_ms must be greater than 0".to_string(),
            ));
        }

        let topics = [
            ("topics.messages", &self.topics.messages),
            ("topics.users", &self.topics.users),
            ("topics.typing", &self.topics.typing),
        ];
        for (field, topic) in topics {
            validate_topic(field, topic)?;
        }
        validate_topic("topics.destination_prefix", &self.topics.destination_prefix)?;

        let [messages, users, typing] = topics.map(|(_, topic)| topic);
        if messages == users || messages == typing || users == typing {
            return Err(ConfigError::InvalidConfig(
                "topics.messages, topics.users and topics.typing must be distinct".to_string(),
            ));
        }

        Ok(())
    }
}

/// Topics are used verbatim, so only reject what MQTT cannot publish or what
/// would break exact matching of inbound topics
fn validate_topic(field: &str, topic: &str) -> Result<(), ConfigError> {
    if topic.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(format!(
            "{field} must name a topic"
        )));
    }
    if topic.contains(['+', '#', '\0']) {
        return Err(ConfigError::InvalidConfig(format!(
            "{field} '{topic}' must not contain wildcards or NUL"
        )));
    }
    Ok(())
}

fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
    env_var_name.and_then(|name| std::env::var(name).ok())
}

fn validate_client_id_prefix(prefix: &str) -> Result<(), ConfigError> {
    let valid_chars = prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if prefix.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidClientId(format!(
            "Client id prefix '{prefix}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

fn validate_broker_url(broker_url: &str) -> Result<(), ConfigError> {
    let url =
        Url::parse(broker_url).map_err(|_| ConfigError::InvalidBrokerUrl(broker_url.to_string()))?;

    if !matches!(url.scheme(), "mqtt" | "mqtts") || url.host_str().is_none() {
        return Err(ConfigError::InvalidBrokerUrl(broker_url.to_string()));
    }

    Ok(())
}
