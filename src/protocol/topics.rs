//! Chat topic routing
//!
//! Topics are used verbatim as MQTT topic names: `chat/messages` and
//! `/chat/messages` are different topics and are never folded together.

use crate::config::TopicsSection;

/// Default topic carrying serialized chat messages
pub const MESSAGES_TOPIC: &str = "/topic/messages";
/// Default topic carrying the online roster snapshot
pub const USERS_TOPIC: &str = "/topic/users";
/// Default topic carrying the raw name of the user currently typing
pub const TYPING_TOPIC: &str = "/topic/typing";
/// Default prefix for outbound destinations
pub const DESTINATION_PREFIX: &str = "/app";

/// The three inbound topics a session consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    Messages,
    Users,
    Typing,
}

impl TopicKind {
    pub const ALL: [TopicKind; 3] = [TopicKind::Messages, TopicKind::Users, TopicKind::Typing];
}

/// Outbound intent destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Join,
    Leave,
    Typing,
    SendMessage,
}

impl Destination {
    /// Path segment appended to the destination prefix
    pub fn name(&self) -> &'static str {
        match self {
            Destination::Join => "join",
            Destination::Leave => "leave",
            Destination::Typing => "typing",
            Destination::SendMessage => "sendMessage",
        }
    }
}

/// Resolved topic names for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMap {
    messages: String,
    users: String,
    typing: String,
    destination_prefix: String,
}

impl TopicMap {
    pub fn new(messages: &str, users: &str, typing: &str, destination_prefix: &str) -> Self {
        Self {
            messages: messages.to_string(),
            users: users.to_string(),
            typing: typing.to_string(),
            destination_prefix: destination_prefix.to_string(),
        }
    }

    pub fn topic(&self, kind: TopicKind) -> &str {
        match kind {
            TopicKind::Messages => &self.messages,
            TopicKind::Users => &self.users,
            TopicKind::Typing => &self.typing,
        }
    }

    /// Map an inbound topic name back to the handler that owns it
    pub fn classify(&self, topic: &str) -> Option<TopicKind> {
        TopicKind::ALL
            .into_iter()
            .find(|kind| self.topic(*kind) == topic)
    }

    /// Build a destination topic: `{prefix}/{name}`, one separator between them
    pub fn destination(&self, destination: Destination) -> String {
        let prefix = self
            .destination_prefix
            .strip_suffix('/')
            .unwrap_or(&self.destination_prefix);
        format!("{}/{}", prefix, destination.name())
    }
}

impl Default for TopicMap {
    fn default() -> Self {
        Self::new(MESSAGES_TOPIC, USERS_TOPIC, TYPING_TOPIC, DESTINATION_PREFIX)
    }
}

impl From<&TopicsSection> for TopicMap {
    fn from(section: &TopicsSection) -> Self {
        Self::new(
            &section.messages,
            &section.users,
            &section.typing,
            &section.destination_prefix,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topic_map() {
        let topics = TopicMap::default();
        assert_eq!(topics.topic(TopicKind::Messages), "/topic/messages");
        assert_eq!(topics.topic(TopicKind::Users), "/topic/users");
        assert_eq!(topics.topic(TopicKind::Typing), "/topic/typing");
    }

    #[test]
    fn test_destinations() {
        let topics = TopicMap::default();
        assert_eq!(topics.destination(Destination::Join), "/app/join");
        assert_eq!(topics.destination(Destination::Leave), "/app/leave");
        assert_eq!(topics.destination(Destination::Typing), "/app/typing");
        assert_eq!(
            topics.destination(Destination::SendMessage),
            "/app/sendMessage"
        );

        let custom = TopicMap::new("m", "u", "t", "chat/app/");
        assert_eq!(custom.destination(Destination::Join), "chat/app/join");

        let bare = TopicMap::new("m", "u", "t", "app");
        assert_eq!(bare.destination(Destination::Leave), "app/leave");
    }

    #[test]
    fn test_classify() {
        let topics = TopicMap::default();
        assert_eq!(
            topics.classify("/topic/messages"),
            Some(TopicKind::Messages)
        );
        assert_eq!(topics.classify("/topic/users"), Some(TopicKind::Users));
        assert_eq!(topics.classify("/topic/typing"), Some(TopicKind::Typing));
        assert_eq!(topics.classify("/topic/online"), None);
        assert_eq!(topics.classify("/app/join"), None);
    }

    #[test]
    fn test_topics_are_matched_exactly() {
        let topics = TopicMap::default();
        assert_eq!(topics.classify("topic/users"), None);
        assert_eq!(topics.classify("/topic/typing/"), None);
        assert_eq!(topics.classify("//topic/messages"), None);

        let relative = TopicMap::new("chat/messages", "chat/users", "chat/typing", "chat/app");
        assert_eq!(relative.topic(TopicKind::Messages), "chat/messages");
        assert_eq!(
            relative.classify("chat/messages"),
            Some(TopicKind::Messages)
        );
        assert_eq!(relative.classify("/chat/messages"), None);
        assert_eq!(
            relative.destination(Destination::SendMessage),
            "chat/app/sendMessage"
        );
    }

    #[test]
    fn test_topic_map_from_section() {
        let section = TopicsSection {
            users: "/topic/online".to_string(),
            ..TopicsSection::default()
        };
        let topics = TopicMap::from(&section);
        assert_eq!(topics.classify("/topic/online"), Some(TopicKind::Users));
        assert_eq!(topics.classify("/topic/users"), None);
    }
}
