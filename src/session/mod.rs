//! The chat session
//!
//! A session keeps the local view of one chat room in sync with the broker:
//!
//! - [`state`] - The snapshot readers see (status, identity, roster, log, typing)
//! - [`dispatcher`] - Folds inbound payloads into the state and owns the typing expiry
//! - [`subscriptions`] - The three topics declared on every ready signal
//! - [`emitter`] - Validates and publishes join, typing, message and leave intents
//! - [`handle`] - Spawning a session and talking to it
//!
//! # Usage
//!
//! ```rust,no_run
//! use neochat::config::ChatConfig;
//! use neochat::session::{ChatSession, ConnectionStatus};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let mut session = ChatSession::connect_mqtt(&ChatConfig::default())?;
//! session
//!     .wait_for_status(ConnectionStatus::Connected, Duration::from_secs(5))
//!     .await?;
//! session.announce_identity("alice").await;
//! session.send_message("alice", "hi").await;
//! session.teardown().await;
//! # Ok::<(), neochat::ChatError>(())
//! # });
//! ```

pub mod dispatcher;
mod driver;
pub mod emitter;
pub mod handle;
pub mod state;
pub mod subscriptions;

pub use dispatcher::{EventDispatcher, DEFAULT_TYPING_EXPIRY};
pub use emitter::{ActionEmitter, Outbound};
pub use handle::{ActionSender, ChatSession, SessionHandle, SessionSettings};
pub use state::{ConnectionStatus, SessionState};
pub use subscriptions::SubscriptionSet;
