//! Test helpers and utilities for integration tests
//!
//! Session tests run on paused Tokio time: sleeping in the test only advances
//! the clock once every other task is idle, so [`settle`] doubles as "let the
//! session finish what it was doing".

use neochat::session::{ChatSession, ConnectionStatus, SessionHandle, SessionSettings};
use neochat::testing::MockTransport;
use std::time::Duration;

/// Upper bound for waiting on a state change that should already be queued
#[allow(dead_code)]
pub const WAIT: Duration = Duration::from_secs(1);

/// Let spawned tasks drain their queues
#[allow(dead_code)]
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

/// Spawn a session over a mock transport without completing the handshake
#[allow(dead_code)]
pub async fn spawned_session(settings: SessionSettings) -> (SessionHandle, MockTransport) {
    let transport = MockTransport::new();
    let handle = ChatSession::spawn(transport.clone(), settings);
    settle().await;
    (handle, transport)
}

/// Spawn a session and complete the handshake; subscriptions are declared
/// by the time this returns
#[allow(dead_code)]
pub async fn connected_session(settings: SessionSettings) -> (SessionHandle, MockTransport) {
    let (handle, transport) = spawned_session(settings).await;
    transport.accept().await;
    handle
        .wait_for_status(ConnectionStatus::Connected, WAIT)
        .await
        .expect("session should connect");
    settle().await;
    (handle, transport)
}
