//! Inbound event dispatch
//!
//! Decodes payloads per topic and folds them into [`SessionState`]. The
//! typing indicator's expiry is a single deadline held here; the driver
//! sleeps until it and calls [`EventDispatcher::expire_typing`].

use super::state::SessionState;
use crate::protocol::{decode_message, decode_name, decode_roster, TopicKind, TopicMap};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// How long a typing indicator stays up without a fresh event
pub const DEFAULT_TYPING_EXPIRY: Duration = Duration::from_millis(1500);

pub struct EventDispatcher {
    topics: TopicMap,
    typing_expiry: Duration,
    typing_deadline: Option<Instant>,
}

impl EventDispatcher {
    pub fn new(topics: TopicMap, typing_expiry: Duration) -> Self {
        Self {
            topics,
            typing_expiry,
            typing_deadline: None,
        }
    }

    pub fn topics(&self) -> &TopicMap {
        &self.topics
    }

    /// Apply one inbound payload; returns true if the state changed
    ///
    /// Payloads that fail to decode are logged and dropped without touching
    /// the state. Topics outside the session's three are ignored.
    pub fn dispatch(
        &mut self,
        state: &mut SessionState,
        topic: &str,
        payload: &[u8],
        now: Instant,
    ) -> bool {
        let Some(kind) = self.topics.classify(topic) else {
            trace!(topic, "Ignoring payload on unknown topic");
            return false;
        };

        match kind {
            TopicKind::Messages => match decode_message(payload) {
                Ok(message) => {
                    debug!(sender = %message.sender, "Chat message received");
                    state.append_message(message);
                    true
                }
                Err(e) => {
                    warn!(topic, error = %e, "Dropping malformed chat message");
                    false
                }
            },
            TopicKind::Users => match decode_roster(payload) {
                Ok(roster) => {
                    debug!(online = roster.len(), "Roster snapshot received");
                    state.replace_roster(roster);
                    true
                }
                Err(e) => {
                    warn!(topic, error = %e, "Dropping malformed roster snapshot");
                    false
                }
            },
            TopicKind::Typing => match decode_name(payload) {
                Ok(name) => {
                    // Any pending expiry is replaced, never queued
                    self.typing_deadline = Some(now + self.typing_expiry);
                    state.set_typing_user(Some(name));
                    true
                }
                Err(e) => {
                    warn!(topic, error = %e, "Dropping malformed typing notification");
                    false
                }
            },
        }
    }

    /// When the current typing indicator lapses, if one is pending
    pub fn typing_deadline(&self) -> Option<Instant> {
        self.typing_deadline
    }

    /// Clear the typing indicator once its deadline has passed
    pub fn expire_typing(&mut self, state: &mut SessionState, now: Instant) -> bool {
        match self.typing_deadline {
            Some(deadline) if now >= deadline => {
                self.typing_deadline = None;
                debug!("Typing indicator expired");
                state.set_typing_user(None)
            }
            _ => false,
        }
    }

    /// Drop any pending deadline
    pub fn cancel_timers(&mut self) {
        self.typing_deadline = None;
    }
}
