//! Mock implementations for testing
//!
//! Provides a scriptable [`MockTransport`] so sessions can be exercised
//! without a broker. Tests drive the link by hand: [`MockTransport::accept`]
//! completes the handshake, [`MockTransport::deliver`] injects inbound
//! payloads and [`MockTransport::drop_link`] simulates a lost connection
//! followed by the fixed reconnect delay.

use crate::error::ChatError;
use crate::transport::{mqtt::ConnectionState, Transport, TransportEvent};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};

pub type PublishedMessage = (String, Vec<u8>);

#[derive(Debug)]
struct MockLink {
    published: Mutex<Vec<PublishedMessage>>,
    subscriptions: Mutex<Vec<String>>,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    state: watch::Sender<Option<ConnectionState>>,
    connects: AtomicUsize,
    teardowns: AtomicUsize,
    attempts: AtomicU32,
    fail_publish: AtomicBool,
}

/// Mock transport for testing
///
/// Clones share the same link, so a test can keep one clone for scripting
/// while the session owns the other.
#[derive(Debug, Clone)]
pub struct MockTransport {
    link: Arc<MockLink>,
    reconnect_delay: Duration,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            link: Arc::new(MockLink {
                published: Mutex::new(Vec::new()),
                subscriptions: Mutex::new(Vec::new()),
                events: Mutex::new(None),
                state,
                connects: AtomicUsize::new(0),
                teardowns: AtomicUsize::new(0),
                attempts: AtomicU32::new(0),
                fail_publish: AtomicBool::new(false),
            }),
            reconnect_delay: Duration::from_millis(3000),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Make every publish fail until switched off again
    pub fn fail_publishes(&self, fail: bool) {
        self.link.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Complete the handshake: the link becomes connected and `Ready` fires
    pub async fn accept(&self) {
        if self.is_closed() {
            return;
        }
        self.link.attempts.store(0, Ordering::SeqCst);
        self.link.state.send_replace(Some(ConnectionState::Connected));
        self.emit(TransportEvent::Ready).await;
    }

    /// Inject an inbound payload on a topic
    pub async fn deliver(&self, topic: &str, payload: impl Into<Bytes>) {
        self.emit(TransportEvent::Message {
            topic: topic.to_string(),
            payload: payload.into(),
        })
        .await;
    }

    /// Lose the link; after the reconnect delay a new attempt is announced
    /// unless the transport was torn down in the meantime
    pub async fn drop_link(&self, reason: &str) {
        if self.is_closed() || self.connection_state().is_none() {
            return;
        }
        self.link
            .state
            .send_replace(Some(ConnectionState::Disconnected(reason.to_string())));
        self.emit(TransportEvent::Lost {
            reason: reason.to_string(),
        })
        .await;

        let transport = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(transport.reconnect_delay).await;
            if transport.is_closed() {
                return;
            }
            let attempt = transport.link.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            transport
                .link
                .state
                .send_replace(Some(ConnectionState::Reconnecting(attempt)));
            transport
                .emit(TransportEvent::Reconnecting { attempt })
                .await;
        });
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.link.published.lock().await.clone()
    }

    /// Payloads published to one destination, in order
    pub async fn published_to(&self, destination: &str) -> Vec<Vec<u8>> {
        self.link
            .published
            .lock()
            .await
            .iter()
            .filter(|(topic, _)| topic == destination)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub async fn subscriptions(&self) -> Vec<String> {
        self.link.subscriptions.lock().await.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.link.connects.load(Ordering::SeqCst)
    }

    pub fn teardown_count(&self) -> usize {
        self.link.teardowns.load(Ordering::SeqCst)
    }

    /// Forget recorded publishes and subscriptions, keeping the link as is
    pub async fn clear_history(&self) {
        self.link.published.lock().await.clear();
        self.link.subscriptions.lock().await.clear();
    }

    fn is_closed(&self) -> bool {
        matches!(*self.link.state.borrow(), Some(ConnectionState::Closed))
    }

    async fn emit(&self, event: TransportEvent) {
        let sender = self.link.events.lock().await.clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    fn require_connected(&self, operation: &str) -> Result<(), ChatError> {
        match self.connection_state() {
            Some(ConnectionState::Connected) => Ok(()),
            other => Err(ChatError::transport(format!(
                "Mock {operation} refused in state {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = ChatError;

    async fn connect(&mut self, events: mpsc::Sender<TransportEvent>) -> Result<(), Self::Error> {
        if self.connection_state().is_some() {
            return Err(ChatError::transport("Mock connection already started"));
        }
        self.link.connects.fetch_add(1, Ordering::SeqCst);
        *self.link.events.lock().await = Some(events);
        self.link.state.send_replace(Some(ConnectionState::Connecting));
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), Self::Error> {
        self.link.teardowns.fetch_add(1, Ordering::SeqCst);
        self.link.state.send_replace(Some(ConnectionState::Closed));
        *self.link.events.lock().await = None;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), Self::Error> {
        self.require_connected("subscribe")?;
        self.link.subscriptions.lock().await.push(topic.to_string());
        Ok(())
    }

    async fn publish(&self, destination: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        if self.link.fail_publish.load(Ordering::SeqCst) {
            return Err(ChatError::transport("Mock publish failure"));
        }
        self.require_connected("publish")?;
        self.link
            .published
            .lock()
            .await
            .push((destination.to_string(), payload));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), Some(ConnectionState::Connected))
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        self.link.state.borrow().clone()
    }
}
