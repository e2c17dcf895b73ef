//! Public entry points for a running session

use super::dispatcher::{EventDispatcher, DEFAULT_TYPING_EXPIRY};
use super::driver::{SessionAction, SessionCommand, SessionDriver};
use super::emitter::ActionEmitter;
use super::state::{ConnectionStatus, SessionState};
use super::subscriptions::SubscriptionSet;
use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::protocol::TopicMap;
use crate::transport::mqtt::MqttClient;
use crate::transport::Transport;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// Queued commands between handles and the driver
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Per-session tuning
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub topics: TopicMap,
    /// How long a typing indicator stays up without a fresh event
    pub typing_expiry: Duration,
    /// Minimum gap between outbound typing notifications; zero disables
    pub typing_throttle: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            topics: TopicMap::default(),
            typing_expiry: DEFAULT_TYPING_EXPIRY,
            typing_throttle: Duration::ZERO,
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            topics: TopicMap::from(&config.topics),
            typing_expiry: Duration::from_millis(config.session.typing_expiry_ms),
            typing_throttle: Duration::from_millis(config.session.typing_throttle_ms),
        }
    }
}

/// Session constructors
pub struct ChatSession;

impl ChatSession {
    /// Start a session over `transport`
    ///
    /// Must be called from within a Tokio runtime. The session starts
    /// connecting immediately; watch the handle for status changes.
    pub fn spawn<T>(transport: T, settings: SessionSettings) -> SessionHandle
    where
        T: Transport + 'static,
    {
        let (state_tx, state_rx) = watch::channel(SessionState::default());
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let driver = SessionDriver::new(
            transport,
            state_tx,
            commands_rx,
            EventDispatcher::new(settings.topics.clone(), settings.typing_expiry),
            SubscriptionSet::new(settings.topics.clone()),
            ActionEmitter::new(settings.topics, settings.typing_throttle),
        );

        let span = crate::session_span!();
        let driver = tokio::spawn(driver.run().instrument(span));

        SessionHandle {
            actions: ActionSender {
                commands: commands_tx,
            },
            state: state_rx,
            driver: Some(driver),
        }
    }

    /// Start a session against the MQTT broker named in `config`
    pub fn connect_mqtt(config: &ChatConfig) -> ChatResult<SessionHandle> {
        config.validate()?;

        let transport = MqttClient::new(&config.client.id_prefix, config.broker.clone())?;
        info!(broker = %config.broker.broker_url, "Starting chat session");

        Ok(Self::spawn(transport, SessionSettings::from_config(config)))
    }
}

/// Cloneable entry point for the three chat actions
///
/// Actions that fail validation (blank input, not connected) are dropped by
/// the session without error.
#[derive(Debug, Clone)]
pub struct ActionSender {
    commands: mpsc::Sender<SessionCommand>,
}

impl ActionSender {
    /// Announce a display name on the join destination
    pub async fn announce_identity(&self, name: impl Into<String>) {
        self.submit(SessionAction::AnnounceIdentity(name.into())).await;
    }

    /// Tell the room `name` is composing a message
    pub async fn announce_typing(&self, name: impl Into<String>) {
        self.submit(SessionAction::AnnounceTyping(name.into())).await;
    }

    pub async fn send_message(&self, sender: impl Into<String>, content: impl Into<String>) {
        self.submit(SessionAction::SendMessage {
            sender: sender.into(),
            content: content.into(),
        })
        .await;
    }

    async fn submit(&self, action: SessionAction) {
        if self
            .commands
            .send(SessionCommand::Action(action))
            .await
            .is_err()
        {
            debug!("Session closed, action dropped");
        }
    }
}

/// Owner's handle to a running session
///
/// Dropping the handle without calling [`SessionHandle::teardown`] aborts
/// the session task.
pub struct SessionHandle {
    actions: ActionSender,
    state: watch::Receiver<SessionState>,
    driver: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Current state
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().status()
    }

    pub fn actions(&self) -> ActionSender {
        self.actions.clone()
    }

    pub async fn announce_identity(&self, name: impl Into<String>) {
        self.actions.announce_identity(name).await;
    }

    pub async fn announce_typing(&self, name: impl Into<String>) {
        self.actions.announce_typing(name).await;
    }

    pub async fn send_message(&self, sender: impl Into<String>, content: impl Into<String>) {
        self.actions.send_message(sender, content).await;
    }

    /// Wait until the state satisfies `predicate` and return that state
    pub async fn wait_for<F>(&self, timeout: Duration, mut predicate: F) -> ChatResult<SessionState>
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut state = self.state.clone();
        let wait = async move {
            loop {
                {
                    let current = state.borrow_and_update();
                    if predicate(&current) {
                        return Ok(current.clone());
                    }
                }
                if state.changed().await.is_err() {
                    return Err(ChatError::SessionClosed);
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ChatError::Timeout {
                waited_ms: timeout.as_millis() as u64,
            })?
    }

    /// Wait until the session reaches `expected`
    pub async fn wait_for_status(
        &self,
        expected: ConnectionStatus,
        timeout: Duration,
    ) -> ChatResult<()> {
        match self
            .wait_for(timeout, |state| state.status() == expected)
            .await
        {
            Ok(_) => Ok(()),
            Err(ChatError::Timeout { waited_ms }) => {
                Err(ChatError::StatusTimeout { expected, waited_ms })
            }
            Err(e) => Err(e),
        }
    }

    /// Announce leave, close the link and wait for the session task to exit
    ///
    /// State is reset to disconnected and empty. Calling it again is a no-op.
    pub async fn teardown(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .actions
            .commands
            .send(SessionCommand::Teardown(ack_tx))
            .await
            .is_ok()
        {
            let _ = ack_rx.await;
        }

        if let Err(e) = driver.await {
            if !e.is_cancelled() {
                warn!("Session task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.driver.is_none()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}
