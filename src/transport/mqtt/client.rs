//! Impure I/O operations for MQTT client
//!
//! This module owns the rumqttc client and the supervisor task that polls the
//! event loop, forwards events to the session and reconnects after a fixed
//! delay whenever the link goes away.

use super::connection::{configure_mqtt_options, ConnectionState, MqttError, ReconnectConfig};
use super::health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
use super::message_handler::{EventRoute, MessageHandler, CHAT_QOS};
use crate::config::BrokerSection;
use crate::transport::{Transport, TransportEvent};
use async_trait::async_trait;
use rumqttc::v5::{AsyncClient, Event, EventLoop};
use rumqttc::Outgoing;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Capacity of the rumqttc request channel
const REQUEST_CHANNEL_CAPACITY: usize = 32;

/// How long teardown waits for the supervisor before aborting it
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How long the supervisor keeps polling to flush requests queued before teardown
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// MQTT transport client for the chat session
pub struct MqttClient {
    client_id_prefix: String,
    config: BrokerSection,
    client: Arc<Mutex<AsyncClient>>,
    // EventLoop is Send but not Sync; the mutex keeps the client shareable
    event_loop: StdMutex<Option<EventLoop>>,
    reconnect_config: ReconnectConfig,
    state_tx: Option<watch::Sender<ConnectionState>>,
    state_rx: Option<watch::Receiver<ConnectionState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    supervisor_handle: Option<JoinHandle<()>>,
}

impl MqttClient {
    pub fn new(client_id_prefix: &str, config: BrokerSection) -> Result<Self, MqttError> {
        let (client, event_loop) = Self::create_connection(client_id_prefix, &config)?;
        let reconnect_config = ReconnectConfig::from_broker(&config);

        Ok(MqttClient {
            client_id_prefix: client_id_prefix.to_string(),
            config,
            client: Arc::new(Mutex::new(client)),
            event_loop: StdMutex::new(Some(event_loop)),
            reconnect_config,
            state_tx: None,
            state_rx: None,
            shutdown_tx: None,
            supervisor_handle: None,
        })
    }

    /// Create a fresh client and event loop
    /// Used for the initial connection and every reconnect
    fn create_connection(
        client_id_prefix: &str,
        config: &BrokerSection,
    ) -> Result<(AsyncClient, EventLoop), MqttError> {
        let mqtt_options = configure_mqtt_options(client_id_prefix, config)?;
        Ok(AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY))
    }

    /// Event loop waiting for `connect`, `None` once started or torn down
    fn pending_event_loop(&mut self) -> &mut Option<EventLoop> {
        self.event_loop
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create connection state and shutdown channels
    #[allow(clippy::type_complexity)]
    fn setup_connection_channels() -> (
        (
            watch::Sender<ConnectionState>,
            watch::Receiver<ConnectionState>,
        ),
        (watch::Sender<bool>, watch::Receiver<bool>),
    ) {
        let state_channels = watch::channel(ConnectionState::Connecting);
        let shutdown_channels = watch::channel(false);
        (state_channels, shutdown_channels)
    }

    /// Start the supervisor; the handshake completes in the background and is
    /// reported as [`TransportEvent::Ready`]
    pub async fn connect(&mut self, events: mpsc::Sender<TransportEvent>) -> Result<(), MqttError> {
        let event_loop = self
            .pending_event_loop()
            .take()
            .ok_or(MqttError::AlreadyStarted)?;

        let ((state_tx, state_rx), (shutdown_tx, shutdown_rx)) =
            Self::setup_connection_channels();
        self.state_tx = Some(state_tx.clone());
        self.state_rx = Some(state_rx);
        self.shutdown_tx = Some(shutdown_tx);

        let supervisor = Supervisor {
            client_id_prefix: self.client_id_prefix.clone(),
            config: self.config.clone(),
            client: self.client.clone(),
            reconnect_config: self.reconnect_config.clone(),
            state_tx,
            shutdown_rx,
            events,
            attempts: 0,
        };

        let span = crate::transport_span!(broker = %self.config.broker_url);
        self.supervisor_handle = Some(tokio::spawn(supervisor.run(event_loop).instrument(span)));

        info!(broker = %self.config.broker_url, "MQTT connection attempt started");
        Ok(())
    }

    /// Close the link and stop reconnecting
    ///
    /// Sends a best-effort DISCONNECT, signals the supervisor and waits for it
    /// to exit before returning. Safe to call more than once.
    pub async fn teardown(&mut self) -> Result<(), MqttError> {
        // A client that never connected can no longer be started either
        self.pending_event_loop().take();

        let Some(handle) = self.supervisor_handle.take() else {
            return Ok(());
        };

        {
            let client = self.client.lock().await;
            if let Err(e) = client.try_disconnect() {
                debug!(target: "mqtt_transport", "Disconnect request not queued: {}", e);
            }
        }

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
            debug!(target: "mqtt_transport", "Sent shutdown signal to supervisor");
        }

        let abort_handle = handle.abort_handle();
        match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
            Ok(Ok(())) => info!("MQTT supervisor shut down gracefully"),
            Ok(Err(e)) if !e.is_cancelled() => warn!("MQTT supervisor ended with error: {}", e),
            Ok(Err(_)) => {}
            Err(_) => {
                warn!("MQTT supervisor didn't shut down in time, aborting");
                abort_handle.abort();
            }
        }

        if let Some(state_tx) = &self.state_tx {
            let next = HealthMonitor::determine_next_state(ConnectionEvent::TornDown);
            let previous = state_tx.send_replace(next.clone());
            HealthMonitor::log_state_transition(&previous, &next);
        }

        Ok(())
    }

    /// Get current connection state
    /// Returns None if connection hasn't been started yet
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.state_rx.as_ref().map(|rx| rx.borrow().clone())
    }

    /// Check connection state before operations
    fn check_connection_state(
        &self,
        allowed: fn(&ConnectionState) -> bool,
    ) -> Result<(), MqttError> {
        let current_state = self
            .connection_state()
            .unwrap_or_else(|| ConnectionState::Disconnected("Not started".to_string()));

        if !allowed(&current_state) {
            return Err(MqttError::NotConnected {
                state: current_state,
            });
        }

        Ok(())
    }

    /// Subscribe to a topic on the current link
    ///
    /// Uses the non-blocking request path: the session task must never wait
    /// on the request channel while the supervisor waits on the event channel.
    pub async fn subscribe(&self, topic: &str) -> Result<(), MqttError> {
        self.check_connection_state(HealthMonitor::can_subscribe)?;

        let client = self.client.lock().await;
        client
            .try_subscribe(topic, CHAT_QOS)
            .map_err(|e| MqttError::SubscriptionFailed(Box::new(e)))?;

        debug!(target: "mqtt_transport", "Subscribed to: {}", topic);
        Ok(())
    }

    /// Publish a payload, QoS 0, not retained
    pub async fn publish(&self, destination: &str, payload: Vec<u8>) -> Result<(), MqttError> {
        self.check_connection_state(HealthMonitor::can_publish)?;

        let client = self.client.lock().await;
        client
            .try_publish(destination, CHAT_QOS, false, payload)
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;

        debug!(target: "mqtt_transport", "Published to: {}", destination);
        Ok(())
    }
}

/// Background task that owns the event loop
struct Supervisor {
    client_id_prefix: String,
    config: BrokerSection,
    client: Arc<Mutex<AsyncClient>>,
    reconnect_config: ReconnectConfig,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_rx: watch::Receiver<bool>,
    events: mpsc::Sender<TransportEvent>,
    attempts: u32,
}

impl Supervisor {
    async fn run(mut self, mut event_loop: EventLoop) {
        info!("Starting MQTT supervisor");

        loop {
            let polled = tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping supervisor");
                        self.drain(&mut event_loop).await;
                        break;
                    }
                    continue;
                }

                polled = event_loop.poll() => polled,
            };

            let keep_running = match polled {
                Ok(event) => self.handle_event(&event, &mut event_loop).await,
                Err(e) => {
                    self.recover(ConnectionEvent::NetworkError(e.to_string()), &mut event_loop)
                        .await
                }
            };

            if !keep_running {
                break;
            }
        }

        info!("MQTT supervisor stopped");
    }

    /// Keep polling until the queued DISCONNECT goes out, so a final publish
    /// made just before teardown still reaches the broker
    async fn drain(&self, event_loop: &mut EventLoop) {
        if !HealthMonitor::can_publish(&self.state_tx.borrow()) {
            return;
        }

        let flush = async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };

        if tokio::time::timeout(DRAIN_TIMEOUT, flush).await.is_err() {
            debug!(target: "mqtt_transport", "Pending requests not flushed before shutdown");
        }
    }

    /// Returns false when the supervisor should stop
    async fn handle_event(&mut self, event: &Event, event_loop: &mut EventLoop) -> bool {
        let route = MessageHandler::route_mqtt_event(event);

        match &route {
            EventRoute::ConnectionAcknowledged => {
                self.attempts = 0;
                self.transition(ConnectionEvent::ConnAckReceived);
            }
            EventRoute::Disconnected => {
                return self
                    .recover(ConnectionEvent::DisconnectedByBroker, event_loop)
                    .await;
            }
            EventRoute::MessageReceived { topic, .. } => {
                debug!(target: "mqtt_transport", "Received MQTT message on topic: {}", topic);
            }
            EventRoute::SubscriptionConfirmed { packet_id, filters } => {
                debug!(target: "mqtt_transport", packet_id, filters, "Subscription confirmed");
            }
            EventRoute::InfrastructureEvent(event_str) => {
                debug!(target: "mqtt_transport", "MQTT event: {}", event_str);
            }
            EventRoute::OutgoingEvent => {}
        }

        match MessageHandler::transport_event(&route) {
            Some(transport_event) => self.emit(transport_event).await,
            None => true,
        }
    }

    fn transition(&self, event: ConnectionEvent) -> ConnectionState {
        let next = HealthMonitor::determine_next_state(event);
        let previous = self.state_tx.send_replace(next.clone());
        HealthMonitor::log_state_transition(&previous, &next);
        next
    }

    /// Forward an event to the session; false if the session is gone or
    /// shutdown was requested while the channel was full
    async fn emit(&self, event: TransportEvent) -> bool {
        tokio::select! {
            sent = self.events.send(event) => {
                if sent.is_err() {
                    warn!("Session stopped listening, stopping supervisor");
                    return false;
                }
                true
            }
            _ = wait_for_shutdown(self.shutdown_rx.clone()) => false,
        }
    }

    /// Report the loss, wait out the fixed delay, then swap in a fresh connection
    async fn recover(&mut self, cause: ConnectionEvent, event_loop: &mut EventLoop) -> bool {
        let reason = match self.transition(cause) {
            ConnectionState::Disconnected(reason) => reason,
            other => format!("{other:?}"),
        };

        if !self.emit(TransportEvent::Lost { reason }).await {
            return false;
        }

        let shutdown_requested = *self.shutdown_rx.borrow();
        let decision = HealthMonitor::should_attempt_reconnection(
            self.attempts,
            &self.reconnect_config,
            shutdown_requested,
        );

        match decision {
            ReconnectionDecision::Proceed { attempt, delay_ms } => {
                self.attempts = attempt;
                info!("Attempting reconnection {} after {}ms delay", attempt, delay_ms);

                if !interruptible_sleep(self.shutdown_rx.clone(), delay_ms).await {
                    return false;
                }

                self.transition(ConnectionEvent::ReconnectionStarted(attempt));
                if !self.emit(TransportEvent::Reconnecting { attempt }).await {
                    return false;
                }

                self.apply_new_connection(event_loop).await;
                true
            }
            ReconnectionDecision::AbortShutdownRequested => {
                info!("Shutdown signal received, stopping reconnection");
                false
            }
        }
    }

    async fn apply_new_connection(&self, event_loop: &mut EventLoop) {
        match MqttClient::create_connection(&self.client_id_prefix, &self.config) {
            Ok((new_client, new_event_loop)) => {
                *event_loop = new_event_loop;

                // Publish and subscribe go through the shared handle
                let mut client_guard = self.client.lock().await;
                *client_guard = new_client;
                debug!(target: "mqtt_transport", "Swapped in new connection");
            }
            Err(e) => {
                // Polling the old event loop again makes rumqttc redial on its own
                error!("Failed to create new connection: {}", e);
            }
        }
    }
}

/// Sleep for `delay_ms` unless shutdown is requested first
/// Returns true if the sleep completed, false if shutdown was requested
async fn interruptible_sleep(shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
    tokio::select! {
        _ = wait_for_shutdown(shutdown_rx) => {
            info!("Shutdown signal received during reconnection delay, stopping");
            false
        }
        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
    }
}

/// Resolves once shutdown is requested or the client is dropped
async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(&mut self, events: mpsc::Sender<TransportEvent>) -> Result<(), Self::Error> {
        MqttClient::connect(self, events).await
    }

    async fn teardown(&mut self) -> Result<(), Self::Error> {
        MqttClient::teardown(self).await
    }

    async fn subscribe(&self, topic: &str) -> Result<(), Self::Error> {
        MqttClient::subscribe(self, topic).await
    }

    async fn publish(&self, destination: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        MqttClient::publish(self, destination, payload).await
    }

    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), Some(ConnectionState::Connected))
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        MqttClient::connection_state(self)
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }

        // No async in Drop; call teardown() for a clean DISCONNECT
        if let Some(handle) = self.supervisor_handle.take() {
            handle.abort();
        }
    }
}
