//! Transport layer for the chat session
//!
//! This module provides the transport abstraction and its MQTT implementation.
//! A transport owns the physical link; it reports everything that happens to
//! that link as [`TransportEvent`]s on the channel handed to [`Transport::connect`].

use bytes::Bytes;
use tokio::sync::mpsc;

pub mod mqtt;

pub use mqtt::ConnectionState;

/// Signals a transport sends to the session
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake completed; fired once per successful connection
    Ready,
    /// The link went away (network failure, broker close, refused handshake)
    Lost { reason: String },
    /// The reconnect delay elapsed and a new attempt is starting
    Reconnecting { attempt: u32 },
    /// A publish arrived on a subscribed topic
    Message { topic: String, payload: Bytes },
}

/// Transport trait for the chat session
///
/// This trait provides an abstraction over the broker link to enable
/// dependency injection and testing.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Begin connecting; returns once the attempt is underway, not when it completes
    async fn connect(&mut self, events: mpsc::Sender<TransportEvent>) -> Result<(), Self::Error>;

    /// Close the link and cancel any pending reconnect. Idempotent.
    async fn teardown(&mut self) -> Result<(), Self::Error>;

    /// Subscribe to a topic on the current link
    async fn subscribe(&self, topic: &str) -> Result<(), Self::Error>;

    /// Publish a payload; refused unless connected
    async fn publish(&self, destination: &str, payload: Vec<u8>) -> Result<(), Self::Error>;

    /// Check if transport is currently connected
    fn is_connected(&self) -> bool;

    /// Current link state, `None` before `connect`
    fn connection_state(&self) -> Option<ConnectionState>;
}
