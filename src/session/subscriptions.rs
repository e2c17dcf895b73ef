//! The set of topics a session listens on
//!
//! Declared on every ready signal and released when the link goes away.
//! Duplicate declarations after a reconnect are harmless.

use crate::protocol::{TopicKind, TopicMap};
use crate::transport::Transport;
use tracing::{debug, warn};

pub struct SubscriptionSet {
    topics: TopicMap,
    active: Vec<String>,
}

impl SubscriptionSet {
    pub fn new(topics: TopicMap) -> Self {
        Self {
            topics,
            active: Vec::new(),
        }
    }

    /// Subscribe to messages, users and typing, in that order
    ///
    /// A failing subscribe is logged and skipped; the next ready retries it.
    pub async fn declare<T: Transport>(&mut self, transport: &T) {
        self.active.clear();

        for kind in TopicKind::ALL {
            let topic = self.topics.topic(kind);
            match transport.subscribe(topic).await {
                Ok(()) => {
                    debug!(topic, "Subscription declared");
                    self.active.push(topic.to_string());
                }
                Err(e) => warn!(topic, error = %e, "Failed to declare subscription"),
            }
        }
    }

    /// Forget the active subscriptions; the broker drops them with the link
    pub fn release(&mut self) {
        if !self.active.is_empty() {
            debug!(count = self.active.len(), "Releasing subscriptions");
        }
        self.active.clear();
    }

    pub fn active(&self) -> &[String] {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockTransport;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_declare_subscribes_three_topics() {
        let mut transport = MockTransport::new();
        let (events_tx, _events_rx) = mpsc::channel(8);
        transport.connect(events_tx).await.unwrap();
        transport.accept().await;

        let mut set = SubscriptionSet::new(TopicMap::default());
        set.declare(&transport).await;

        let expected = ["/topic/messages", "/topic/users", "/topic/typing"];
        assert_eq!(set.active(), expected);
        assert_eq!(transport.subscriptions().await, expected);
    }

    #[tokio::test]
    async fn test_declare_skips_failures() {
        let transport = MockTransport::new();

        let mut set = SubscriptionSet::new(TopicMap::default());
        set.declare(&transport).await;

        assert!(set.active().is_empty());
        assert!(transport.subscriptions().await.is_empty());
    }

    #[tokio::test]
    async fn test_release_and_redeclare() {
        let mut transport = MockTransport::new();
        let (events_tx, _events_rx) = mpsc::channel(8);
        transport.connect(events_tx).await.unwrap();
        transport.accept().await;

        let mut set = SubscriptionSet::new(TopicMap::default());
        set.declare(&transport).await;
        set.release();
        assert!(set.active().is_empty());

        set.declare(&transport).await;
        assert_eq!(set.active().len(), 3);
        assert_eq!(transport.subscriptions().await.len(), 6);
    }
}
