//! MQTT transport for the chat session
//!
//! The client is split the same way as the rest of the crate: pure decisions
//! live apart from the task that performs I/O.
//!
//! # Architecture
//!
//! - [`connection`] - Pure connection state, reconnect policy and option building
//! - [`message_handler`] - Pure routing of rumqttc events
//! - [`health_monitor`] - Pure state transitions and reconnection decisions
//! - [`client`] - The client and its reconnect supervisor task
//!
//! # Usage
//!
//! ```rust,no_run
//! use neochat::config::BrokerSection;
//! use neochat::transport::mqtt::MqttClient;
//! use neochat::transport::Transport;
//!
//! # tokio_test::block_on(async {
//! let (events_tx, mut events_rx) = tokio::sync::mpsc::channel(64);
//! let mut client = MqttClient::new("neochat", BrokerSection::default())?;
//! client.connect(events_tx).await?;
//! while let Some(event) = events_rx.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod message_handler;

pub use client::MqttClient;
pub use connection::{ConnectionState, MqttError, ReconnectConfig};
pub use health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
pub use message_handler::{EventRoute, MessageHandler};
