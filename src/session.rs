//! The dispatcher: one [`Session`] per client lifetime.
//!
//! Inbound transport events are decoded and routed to [`SessionState`] and
//! the [`Renderer`]; local user actions are validated, encoded and handed to
//! the [`Transport`]. Everything runs on the thread that owns the session.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::ChatError;
use crate::protocol::{InboundEvent, OutboundIntent};
use crate::render::{local_clock, ChatLine, ConnectionStatus, Renderer};
use crate::state::{Recipient, SessionState};
use crate::transport::{Transport, TransportEvent};
use crate::typing::TypingIndicator;

pub struct Session<T: Transport, R: Renderer> {
    transport: T,
    renderer: R,
    state: SessionState,
    typing: TypingIndicator,
    status: ConnectionStatus,
    // identity already announced on the current connection
    announced: bool,
}

impl<T: Transport, R: Renderer> Session<T, R> {
    pub fn new(transport: T, renderer: R, typing_timeout: Duration) -> Self {
        Self {
            transport,
            renderer,
            state: SessionState::new(),
            typing: TypingIndicator::new(typing_timeout),
            status: ConnectionStatus::Disconnected,
            announced: false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// When the typing indicator is next due to hide, if it is shown.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.typing.deadline()
    }

    pub fn handle_transport(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Connecting => self.set_status(ConnectionStatus::Connecting),
            TransportEvent::Open => {
                if self.status == ConnectionStatus::Connected {
                    debug!("Already connected, ignoring open");
                    return;
                }
                self.set_status(ConnectionStatus::Connected);
                self.announce_identity();
            }
            TransportEvent::Close => self.set_status(ConnectionStatus::Disconnected),
            TransportEvent::Error(e) => {
                warn!("Transport error: {}", e);
                self.set_status(ConnectionStatus::Disconnected);
            }
            TransportEvent::Message(raw) => self.handle_message(&raw, now),
            TransportEvent::Undelivered(count) => {
                self.renderer.report(&ChatError::Undelivered(count));
            }
        }
    }

    /// Hides the typing indicator once its timeout has passed.
    pub fn tick(&mut self, now: Instant) {
        if let Some(sender) = self.typing.expire(now) {
            debug!("{} stopped typing", sender);
            self.renderer.typing_hidden();
        }
    }

    /// Changes the local identity. It is announced right away when connected,
    /// otherwise as soon as the next connection opens.
    pub fn set_identity(&mut self, name: &str) -> Result<(), ChatError> {
        if let Err(e) = self.state.set_identity(name) {
            return Err(self.reject(e));
        }
        info!("Identity set to {:?}", name);
        self.renderer.identity_changed(name);
        self.refresh_peers();

        self.announced = false;
        if self.status == ConnectionStatus::Connected {
            self.announce_identity();
        }
        Ok(())
    }

    pub fn select_recipient(&mut self, choice: Recipient) -> Result<(), ChatError> {
        if let Err(e) = self.state.select_recipient(choice) {
            return Err(self.reject(e));
        }
        self.renderer.selection_changed(self.state.selection());
        Ok(())
    }

    pub fn cycle_recipient(&mut self) {
        let selection = self.state.cycle_recipient();
        self.renderer.selection_changed(selection);
    }

    /// The user edited the message being composed.
    pub fn composing(&mut self) -> Result<(), ChatError> {
        if self.status != ConnectionStatus::Connected {
            return Ok(());
        }
        let Some(username) = self.state.identity() else {
            return Ok(());
        };
        let intent = OutboundIntent::Typing {
            username: username.to_string(),
        };
        self.send(&intent)
    }

    /// Sends `text` to the selected recipient.
    pub fn submit(&mut self, text: &str) -> Result<(), ChatError> {
        if self.status != ConnectionStatus::Connected {
            return Err(self.reject(ChatError::NotConnected));
        }
        let username = match self.state.identity() {
            Some(name) if !text.trim().is_empty() => name.to_string(),
            _ => {
                return Err(self.reject(ChatError::Validation(
                    "enter a username and a message".into(),
                )))
            }
        };

        let intent = match self.state.selection() {
            Recipient::Public => OutboundIntent::SendBroadcast {
                username,
                message: text.to_string(),
            },
            Recipient::Peer(to) => OutboundIntent::SendPrivate {
                username,
                to: to.clone(),
                message: text.to_string(),
            },
        };
        self.send(&intent)
    }

    /// Says goodbye if connected, then releases the timer and the
    /// connection.
    pub fn shutdown(&mut self) {
        if self.status == ConnectionStatus::Connected {
            if let Err(e) = self.send(&OutboundIntent::Leave) {
                warn!("Could not send leave: {}", e);
            }
        }
        self.typing.cancel();
        self.transport.shutdown();
        self.announced = false;
        self.status = ConnectionStatus::Disconnected;
        info!("Session closed");
    }

    fn handle_message(&mut self, raw: &str, now: Instant) {
        match InboundEvent::decode(raw) {
            Ok(Some(event)) => {
                debug!("Received {}", event.action());
                self.dispatch(event, now);
            }
            Ok(None) => debug!("Ignoring record with unknown action: {}", raw),
            Err(e) => {
                warn!("Dropping inbound record: {}", e);
                self.renderer.report(&e);
            }
        }
    }

    fn dispatch(&mut self, event: InboundEvent, now: Instant) {
        match event {
            InboundEvent::ListUsers { connected_users } => {
                if self.state.replace_peers(connected_users) {
                    info!("Selected recipient left, sending publicly");
                }
                self.refresh_peers();
            }
            InboundEvent::Typing { from } => {
                if self.state.identity() == Some(from.as_str()) {
                    return;
                }
                self.typing.show(&from, now);
                self.renderer.typing_shown(&from);
            }
            InboundEvent::Broadcast {
                username,
                message,
                timestamp,
            } => self.renderer.append(ChatLine::Public {
                sender: username,
                text: message,
                timestamp: timestamp.unwrap_or_else(local_clock),
            }),
            InboundEvent::Private {
                from,
                to,
                message,
                timestamp,
            } => {
                let timestamp = timestamp.unwrap_or_else(local_clock);
                let line = if self.state.identity() == Some(from.as_str()) {
                    ChatLine::PrivateSent {
                        to,
                        text: message,
                        timestamp,
                    }
                } else {
                    ChatLine::PrivateReceived {
                        from,
                        text: message,
                        timestamp,
                    }
                };
                self.renderer.append(line);
            }
            InboundEvent::Error { message } => {
                self.renderer.append(ChatLine::ServerError { message })
            }
        }
    }

    fn announce_identity(&mut self) {
        if self.announced {
            return;
        }
        let Some(username) = self.state.identity() else {
            return;
        };
        let intent = OutboundIntent::SetUsername {
            username: username.to_string(),
        };
        match self.send(&intent) {
            Ok(()) => self.announced = true,
            Err(e) => warn!("Could not announce identity: {}", e),
        }
    }

    fn send(&mut self, intent: &OutboundIntent) -> Result<(), ChatError> {
        if self.status != ConnectionStatus::Connected {
            return Err(ChatError::NotConnected);
        }
        let result = intent.encode().and_then(|text| self.transport.send(&text));
        match result {
            Ok(()) => {
                debug!("Sent {}", intent.action());
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    fn refresh_peers(&mut self) {
        let recipients = self.state.recipients();
        self.renderer
            .peers_changed(self.state.peers(), &recipients, self.state.selection());
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if status != ConnectionStatus::Connected {
            self.announced = false;
        }
        if self.status != status {
            info!("Connection status: {}", status);
            self.status = status;
            self.renderer.status_changed(status);
        }
    }

    fn reject(&mut self, error: ChatError) -> ChatError {
        self.renderer.report(&error);
        error
    }
}
