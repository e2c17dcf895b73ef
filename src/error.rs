//! Error types for the chat session client
//!
//! Only construction and lifecycle calls return these. Transport faults,
//! decode faults and declined actions are absorbed by the session and show
//! up as status changes or log lines instead.

use crate::config::ConfigError;
use crate::session::ConnectionStatus;
use crate::transport::mqtt::MqttError;
use thiserror::Error;

/// Main error type for session operations
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("MQTT transport error: {0}")]
    Mqtt(#[from] MqttError),

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Session has been torn down")]
    SessionClosed,

    #[error("Timed out after {waited_ms}ms waiting for session state")]
    Timeout { waited_ms: u64 },

    #[error("Timed out after {waited_ms}ms waiting for status {expected:?}")]
    StatusTimeout {
        expected: ConnectionStatus,
        waited_ms: u64,
    },
}

impl ChatError {
    /// Create a generic transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

/// Result type for session operations
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            ChatError::transport("link down"),
            ChatError::SessionClosed,
            ChatError::Timeout { waited_ms: 250 },
            ChatError::StatusTimeout {
                expected: ConnectionStatus::Connected,
                waited_ms: 250,
            },
            ChatError::Config(ConfigError::InvalidConfig("bad".to_string())),
            ChatError::Mqtt(MqttError::InvalidBrokerUrl("nope".to_string())),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_timeout_message_names_status() {
        let error = ChatError::StatusTimeout {
            expected: ConnectionStatus::Connected,
            waited_ms: 100,
        };
        let text = error.to_string();
        assert!(text.contains("Connected"));
        assert!(text.contains("100ms"));
    }

    #[test]
    fn test_from_config_error() {
        let error: ChatError = ConfigError::InvalidClientId("x y".to_string()).into();
        assert!(matches!(error, ChatError::Config(_)));
    }
}
