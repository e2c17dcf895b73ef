//! Pure routing of MQTT events
//!
//! This module turns raw rumqttc events into routing decisions for the
//! supervisor. It never touches the network.

use crate::transport::TransportEvent;
use bytes::Bytes;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::Event;

/// QoS for every chat publish and subscription: at-most-once, best effort
pub const CHAT_QOS: QoS = QoS::AtMostOnce;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    payload: publish.payload.clone(),
                },
                Packet::Disconnect(_) => EventRoute::Disconnected,
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                    filters: suback.return_codes.len(),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Session-facing event for a route, if the session cares about it
    pub fn transport_event(route: &EventRoute) -> Option<TransportEvent> {
        match route {
            EventRoute::ConnectionAcknowledged => Some(TransportEvent::Ready),
            EventRoute::MessageReceived { topic, payload } => Some(TransportEvent::Message {
                topic: topic.clone(),
                payload: payload.clone(),
            }),
            _ => None,
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged,
    /// Message received on subscribed topic
    MessageReceived { topic: String, payload: Bytes },
    /// MQTT broker disconnected
    Disconnected,
    /// Subscription confirmed
    SubscriptionConfirmed { packet_id: u16, filters: usize },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}
