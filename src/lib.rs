//! NeoChat - realtime chat session client
//!
//! A client-side chat participant that keeps a local view of one chat room
//! in sync with an MQTT broker.
//!
//! # Overview
//!
//! This crate provides:
//! - Chat payload types and topic naming
//! - An MQTT transport with fixed-delay automatic reconnection
//! - A session task that folds inbound events into an observable state
//! - Validated outbound actions (join, typing, send, leave)
//!
//! # Quick Start
//!
//! ```rust
//! use neochat::protocol::{decode_roster, ChatMessage, TopicKind, TopicMap};
//!
//! let topics = TopicMap::default();
//! assert_eq!(topics.classify("/topic/users"), Some(TopicKind::Users));
//!
//! let roster = decode_roster(br#"["alice","bob"]"#).unwrap();
//! assert_eq!(roster, vec!["alice", "bob"]);
//!
//! let message = ChatMessage::new("alice", "hi");
//! let json = serde_json::to_string(&message).unwrap();
//! assert_eq!(json, r#"{"sender":"alice","content":"hi"}"#);
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod session;
pub mod testing;
pub mod transport;

pub use config::*;
pub use error::{ChatError, ChatResult};
pub use protocol::*;
pub use session::{
    ActionSender, ChatSession, ConnectionStatus, SessionHandle, SessionSettings, SessionState,
};
pub use transport::mqtt::MqttClient;
