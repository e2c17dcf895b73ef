//! Outbound actions
//!
//! Each intent is checked against the session state first. An intent that
//! fails its check produces nothing; one that passes is published once and
//! any transport failure is logged and swallowed.

use super::state::SessionState;
use crate::protocol::{encode_message, ChatMessage, Destination, TopicMap};
use crate::transport::Transport;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A publish the emitter has decided to make
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub destination: String,
    pub payload: Vec<u8>,
}

pub struct ActionEmitter {
    topics: TopicMap,
    typing_throttle: Duration,
    last_typing: Option<Instant>,
}

impl ActionEmitter {
    /// A zero throttle publishes a typing notification on every call
    pub fn new(topics: TopicMap, typing_throttle: Duration) -> Self {
        Self {
            topics,
            typing_throttle,
            last_typing: None,
        }
    }

    /// Join announcement: the trimmed name, only while connected
    pub fn join_intent(&self, state: &SessionState, name: &str) -> Option<Outbound> {
        let name = name.trim();
        if name.is_empty() || !state.is_connected() {
            return None;
        }

        Some(Outbound {
            destination: self.topics.destination(Destination::Join),
            payload: name.as_bytes().to_vec(),
        })
    }

    /// Typing notification: the name exactly as given
    pub fn typing_intent(
        &mut self,
        state: &SessionState,
        name: &str,
        now: Instant,
    ) -> Option<Outbound> {
        if name.is_empty() || !state.is_connected() {
            return None;
        }

        if let Some(last) = self.last_typing {
            if !self.typing_throttle.is_zero() && now.duration_since(last) < self.typing_throttle {
                return None;
            }
        }
        self.last_typing = Some(now);

        Some(Outbound {
            destination: self.topics.destination(Destination::Typing),
            payload: name.as_bytes().to_vec(),
        })
    }

    /// Chat message: both fields trimmed and non-empty, only while connected
    pub fn send_intent(
        &self,
        state: &SessionState,
        sender: &str,
        content: &str,
    ) -> Option<Outbound> {
        let (sender, content) = (sender.trim(), content.trim());
        if sender.is_empty() || content.is_empty() || !state.is_connected() {
            return None;
        }

        match encode_message(&ChatMessage::new(sender, content)) {
            Ok(payload) => Some(Outbound {
                destination: self.topics.destination(Destination::SendMessage),
                payload,
            }),
            Err(e) => {
                warn!(error = %e, "Failed to encode chat message");
                None
            }
        }
    }

    /// Leave announcement for the committed identity
    pub fn leave_intent(&self, state: &SessionState) -> Option<Outbound> {
        let identity = state.identity()?;
        if !state.is_connected() {
            return None;
        }

        Some(Outbound {
            destination: self.topics.destination(Destination::Leave),
            payload: identity.as_bytes().to_vec(),
        })
    }

    /// Publish an outbound intent; returns whether the transport accepted it
    pub async fn emit<T: Transport>(transport: &T, outbound: Outbound) -> bool {
        match transport
            .publish(&outbound.destination, outbound.payload)
            .await
        {
            Ok(()) => {
                debug!(destination = %outbound.destination, "Published");
                true
            }
            Err(e) => {
                warn!(destination = %outbound.destination, error = %e, "Publish failed, dropping");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ConnectionStatus;

    fn connected_state() -> SessionState {
        let mut state = SessionState::default();
        state.set_status(ConnectionStatus::Connected);
        state
    }

    fn emitter() -> ActionEmitter {
        ActionEmitter::new(TopicMap::default(), Duration::ZERO)
    }

    #[test]
    fn test_join_intent_trims_name() {
        let outbound = emitter()
            .join_intent(&connected_state(), "  alice ")
            .unwrap();
        assert_eq!(outbound.destination, "/app/join");
        assert_eq!(outbound.payload, b"alice");
    }

    #[test]
    fn test_join_intent_declined() {
        let emitter = emitter();
        assert!(emitter.join_intent(&connected_state(), "   ").is_none());
        assert!(emitter.join_intent(&SessionState::default(), "alice").is_none());
    }

    #[test]
    fn test_typing_intent_keeps_raw_name() {
        let outbound = emitter()
            .typing_intent(&connected_state(), " alice ", Instant::now())
            .unwrap();
        assert_eq!(outbound.destination, "/app/typing");
        assert_eq!(outbound.payload, b" alice ");
    }

    #[test]
    fn test_typing_intent_declined() {
        let mut emitter = emitter();
        let now = Instant::now();
        assert!(emitter.typing_intent(&connected_state(), "", now).is_none());
        assert!(emitter
            .typing_intent(&SessionState::default(), "alice", now)
            .is_none());
    }

    #[test]
    fn test_typing_without_throttle_publishes_every_call() {
        let mut emitter = emitter();
        let state = connected_state();
        let now = Instant::now();

        for _ in 0..5 {
            assert!(emitter.typing_intent(&state, "alice", now).is_some());
        }
    }

    #[test]
    fn test_typing_throttle_suppresses_repeats() {
        let mut emitter = ActionEmitter::new(TopicMap::default(), Duration::from_millis(500));
        let state = connected_state();
        let start = Instant::now();

        assert!(emitter.typing_intent(&state, "alice", start).is_some());
        assert!(emitter
            .typing_intent(&state, "alice", start + Duration::from_millis(200))
            .is_none());
        assert!(emitter
            .typing_intent(&state, "alice", start + Duration::from_millis(500))
            .is_some());
    }

    #[test]
    fn test_send_intent_encodes_trimmed_json() {
        let outbound = emitter()
            .send_intent(&connected_state(), " alice ", " hello ")
            .unwrap();
        assert_eq!(outbound.destination, "/app/sendMessage");

        let message: ChatMessage = serde_json::from_slice(&outbound.payload).unwrap();
        assert_eq!(message, ChatMessage::new("alice", "hello"));
    }

    #[test]
    fn test_send_intent_declined() {
        let emitter = emitter();
        let state = connected_state();
        assert!(emitter.send_intent(&state, "", "hello").is_none());
        assert!(emitter.send_intent(&state, "alice", "").is_none());
        assert!(emitter.send_intent(&state, "alice", "   ").is_none());
        assert!(emitter
            .send_intent(&SessionState::default(), "alice", "hello")
            .is_none());
    }

    #[test]
    fn test_leave_intent_requires_identity_and_link() {
        let emitter = emitter();
        let mut state = connected_state();
        assert!(emitter.leave_intent(&state).is_none());

        state.commit_identity("alice");
        let outbound = emitter.leave_intent(&state).unwrap();
        assert_eq!(outbound.destination, "/app/leave");
        assert_eq!(outbound.payload, b"alice");

        state.set_status(ConnectionStatus::Disconnected);
        assert!(emitter.leave_intent(&state).is_none());
    }

    #[test]
    fn test_custom_destination_prefix() {
        let topics = TopicMap::new("/topic/messages", "/topic/online", "/topic/typing", "/chat");
        let emitter = ActionEmitter::new(topics, Duration::ZERO);
        let outbound = emitter.join_intent(&connected_state(), "alice").unwrap();
        assert_eq!(outbound.destination, "/chat/join");
    }
}
