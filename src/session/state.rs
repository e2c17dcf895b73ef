//! Local view of the chat session
//!
//! Readers get clones through the session's watch channel. Only the session
//! driver mutates it, through the crate-private methods below.

use crate::protocol::ChatMessage;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Session-level link status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
        }
    }
}

/// Snapshot of everything the session knows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    status: ConnectionStatus,
    identity: Option<String>,
    roster: Vec<String>,
    log: Vec<ChatMessage>,
    typing_user: Option<String>,
    reconnect_count: u32,
    connected_since: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Name committed by the first successful join announcement
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Participants from the most recent users snapshot, in server order
    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Messages in arrival order
    pub fn log(&self) -> &[ChatMessage] {
        &self.log
    }

    pub fn typing_user(&self) -> Option<&str> {
        self.typing_user.as_deref()
    }

    /// Typing user as a presenter should show it: an empty name means nobody,
    /// and the local participant is never shown as typing to themselves
    pub fn visible_typing_user(&self) -> Option<&str> {
        match (self.typing_user(), self.identity()) {
            (Some(""), _) => None,
            (Some(typing), Some(me)) if typing == me => None,
            (typing, _) => typing,
        }
    }

    /// Ready signals received after the first one
    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count
    }

    /// When the current link became ready
    pub fn connected_since(&self) -> Option<DateTime<Utc>> {
        self.connected_since
    }

    /// Returns true if the status changed
    pub(crate) fn set_status(&mut self, status: ConnectionStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        if status != ConnectionStatus::Connected {
            self.connected_since = None;
        }
        true
    }

    pub(crate) fn record_connected(&mut self, at: DateTime<Utc>) {
        if self.connected_since.is_none() && self.status == ConnectionStatus::Connected {
            self.connected_since = Some(at);
        }
    }

    pub(crate) fn record_reconnect(&mut self) {
        self.reconnect_count = self.reconnect_count.saturating_add(1);
    }

    pub(crate) fn append_message(&mut self, message: ChatMessage) {
        self.log.push(message);
    }

    pub(crate) fn replace_roster(&mut self, roster: Vec<String>) {
        self.roster = roster;
    }

    /// Returns true if the indicator changed
    pub(crate) fn set_typing_user(&mut self, typing_user: Option<String>) -> bool {
        if self.typing_user == typing_user {
            return false;
        }
        self.typing_user = typing_user;
        true
    }

    /// Identity is set at most once per session
    pub(crate) fn commit_identity(&mut self, name: &str) -> bool {
        if self.identity.is_some() {
            return false;
        }
        self.identity = Some(name.to_string());
        true
    }

    /// Back to the initial empty state
    pub(crate) fn reset(&mut self) {
        *self = SessionState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = SessionState::default();
        assert_eq!(state.status(), ConnectionStatus::Disconnected);
        assert!(state.identity().is_none());
        assert!(state.roster().is_empty());
        assert!(state.log().is_empty());
        assert!(state.typing_user().is_none());
        assert_eq!(state.reconnect_count(), 0);
        assert!(state.connected_since().is_none());
    }

    #[test]
    fn test_identity_commits_once() {
        let mut state = SessionState::default();
        assert!(state.commit_identity("alice"));
        assert!(!state.commit_identity("bob"));
        assert_eq!(state.identity(), Some("alice"));
    }

    #[test]
    fn test_roster_is_replaced_not_merged() {
        let mut state = SessionState::default();
        state.replace_roster(vec!["alice".to_string(), "bob".to_string()]);
        state.replace_roster(vec!["carol".to_string()]);
        assert_eq!(state.roster(), ["carol".to_string()]);
    }

    #[test]
    fn test_visible_typing_user_hides_self() {
        let mut state = SessionState::default();
        state.commit_identity("alice");

        state.set_typing_user(Some("alice".to_string()));
        assert_eq!(state.typing_user(), Some("alice"));
        assert_eq!(state.visible_typing_user(), None);

        state.set_typing_user(Some("bob".to_string()));
        assert_eq!(state.visible_typing_user(), Some("bob"));
    }

    #[test]
    fn test_visible_typing_user_ignores_empty_name() {
        let mut state = SessionState::default();
        state.set_typing_user(Some(String::new()));
        assert_eq!(state.typing_user(), Some(""));
        assert_eq!(state.visible_typing_user(), None);
    }

    #[test]
    fn test_connected_since_follows_status() {
        let mut state = SessionState::default();
        let now = Utc::now();

        state.record_connected(now);
        assert!(state.connected_since().is_none());

        assert!(state.set_status(ConnectionStatus::Connected));
        state.record_connected(now);
        assert_eq!(state.connected_since(), Some(now));

        assert!(!state.set_status(ConnectionStatus::Connected));
        assert!(state.set_status(ConnectionStatus::Disconnected));
        assert!(state.connected_since().is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = SessionState::default();
        state.set_status(ConnectionStatus::Connected);
        state.commit_identity("alice");
        state.append_message(ChatMessage::new("alice", "hi"));
        state.replace_roster(vec!["alice".to_string()]);
        state.set_typing_user(Some("bob".to_string()));
        state.record_reconnect();

        state.reset();
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
    }
}
