//! The session task
//!
//! One task owns the transport, the dispatcher, the subscription set and the
//! emitter. Transport events, handle commands and the typing deadline are
//! processed one at a time through a single select loop, and the resulting
//! state is published on a watch channel whose only sender lives here.

use super::dispatcher::EventDispatcher;
use super::emitter::ActionEmitter;
use super::state::{ConnectionStatus, SessionState};
use super::subscriptions::SubscriptionSet;
use crate::transport::{Transport, TransportEvent};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Buffered transport events between the supervisor and the session
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Outbound intents queued by the presentation layer
#[derive(Debug)]
pub(crate) enum SessionAction {
    AnnounceIdentity(String),
    AnnounceTyping(String),
    SendMessage { sender: String, content: String },
}

/// Requests from a [`SessionHandle`](super::SessionHandle)
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Action(SessionAction),
    Teardown(oneshot::Sender<()>),
}

pub(crate) struct SessionDriver<T: Transport> {
    transport: T,
    state: watch::Sender<SessionState>,
    commands: mpsc::Receiver<SessionCommand>,
    dispatcher: EventDispatcher,
    subscriptions: SubscriptionSet,
    emitter: ActionEmitter,
    ready_seen: bool,
}

impl<T: Transport> SessionDriver<T> {
    pub(crate) fn new(
        transport: T,
        state: watch::Sender<SessionState>,
        commands: mpsc::Receiver<SessionCommand>,
        dispatcher: EventDispatcher,
        subscriptions: SubscriptionSet,
        emitter: ActionEmitter,
    ) -> Self {
        Self {
            transport,
            state,
            commands,
            dispatcher,
            subscriptions,
            emitter,
            ready_seen: false,
        }
    }

    pub(crate) async fn run(mut self) {
        let (events_tx, mut events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        self.set_status(ConnectionStatus::Connecting);
        if let Err(e) = self.transport.connect(events_tx).await {
            error!(error = %e, "Failed to start transport");
            self.set_status(ConnectionStatus::Disconnected);
        }

        loop {
            let typing_deadline = self.dispatcher.typing_deadline();

            tokio::select! {
                Some(event) = events.recv() => self.handle_transport_event(event).await,

                command = self.commands.recv() => match command {
                    Some(SessionCommand::Teardown(ack)) => {
                        self.teardown().await;
                        let _ = ack.send(());
                        break;
                    }
                    Some(SessionCommand::Action(action)) => self.handle_action(action).await,
                    None => {
                        debug!("All session handles dropped");
                        self.teardown().await;
                        break;
                    }
                },

                _ = sleep_until_opt(typing_deadline) => {
                    let now = Instant::now();
                    let dispatcher = &mut self.dispatcher;
                    self.state
                        .send_if_modified(|state| dispatcher.expire_typing(state, now));
                }
            }
        }

        debug!("Session driver stopped");
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Ready => {
                let reconnected = self.ready_seen;
                self.ready_seen = true;
                info!(reconnected, "Session ready");

                self.state.send_modify(|state| {
                    state.set_status(ConnectionStatus::Connected);
                    if reconnected {
                        state.record_reconnect();
                    }
                    state.record_connected(Utc::now());
                });

                self.subscriptions.declare(&self.transport).await;
            }
            TransportEvent::Lost { reason } => {
                warn!(%reason, "Session link lost");
                self.set_status(ConnectionStatus::Disconnected);
                self.subscriptions.release();
            }
            TransportEvent::Reconnecting { attempt } => {
                info!(attempt, "Session reconnecting");
                self.set_status(ConnectionStatus::Connecting);
            }
            TransportEvent::Message { topic, payload } => {
                let now = Instant::now();
                let dispatcher = &mut self.dispatcher;
                self.state
                    .send_if_modified(|state| dispatcher.dispatch(state, &topic, &payload, now));
            }
        }
    }

    async fn handle_action(&mut self, action: SessionAction) {
        match action {
            SessionAction::AnnounceIdentity(name) => {
                let outbound = self.emitter.join_intent(&self.state.borrow(), &name);
                let Some(outbound) = outbound else {
                    debug!("Join announcement declined");
                    return;
                };
                if ActionEmitter::emit(&self.transport, outbound).await {
                    self.state
                        .send_if_modified(|state| state.commit_identity(name.trim()));
                }
            }
            SessionAction::AnnounceTyping(name) => {
                let outbound =
                    self.emitter
                        .typing_intent(&self.state.borrow(), &name, Instant::now());
                if let Some(outbound) = outbound {
                    ActionEmitter::emit(&self.transport, outbound).await;
                }
            }
            SessionAction::SendMessage { sender, content } => {
                let outbound = self
                    .emitter
                    .send_intent(&self.state.borrow(), &sender, &content);
                match outbound {
                    Some(outbound) => {
                        ActionEmitter::emit(&self.transport, outbound).await;
                    }
                    None => debug!("Chat message declined"),
                }
            }
        }
    }

    /// Leave, close the link, clear timers and subscriptions, reset state
    async fn teardown(&mut self) {
        let leave = self.emitter.leave_intent(&self.state.borrow());
        if let Some(outbound) = leave {
            ActionEmitter::emit(&self.transport, outbound).await;
        }

        if let Err(e) = self.transport.teardown().await {
            warn!(error = %e, "Transport teardown reported an error");
        }

        self.dispatcher.cancel_timers();
        self.subscriptions.release();
        self.state.send_modify(SessionState::reset);

        info!("Session torn down");
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.state
            .send_if_modified(|state| state.set_status(status));
    }
}

/// Sleep until the deadline, or forever if there is none
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
