//! # Connection
//!
//! Binds one transport session to one registry and drives it through
//! `Open -> Closing -> Closed`.
//!
//! ## Invariants
//! - Messages are dispatched strictly in arrival order, one at a time.
//! - Every error ends the connection. There is no per-message retry.
//! - Teardown runs exactly once: the registry is cleared on the transition into
//!   `Closed`, and every later close request is a no-op.
//! - Events queued by handlers reach the session in the order they were queued.

use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;
use westpack::Arg;
use westpack::Fd;
use westpack::Message;
use westpack::ObjectId;
use westpack::Packet;
use westpack::RawMessage;

use crate::config::Config;
use crate::context::Context;
use crate::error::Error;
use crate::error::Result;
use crate::global::Globals;
use crate::registry::ERROR_EVENT;
use crate::registry::Registry;
use crate::session::CloseReason;
use crate::session::Payload;
use crate::session::Session;
use crate::session::SessionId;
use crate::session::TransportError;

/// Lifecycle of a connection. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

/// One peer's protocol state: its session, its registry, and its pending events.
pub struct Connection {
    id: SessionId,
    session: Arc<dyn Session>,
    config: Arc<Config>,
    registry: Registry,
    outbox: Vec<Message>,
    state: ConnectionState,
}

impl Connection {
    /// Accepts a freshly opened session.
    ///
    /// Refuses the session before any registry exists when the subprotocol does not
    /// match. Otherwise creates the registry, announces the globals, and flushes the
    /// announcements before returning, so they precede any inbound processing.
    pub async fn open(session: Arc<dyn Session>, globals: &Globals, config: Arc<Config>) -> Result<Self> {
        let id = session.id();
        let expected = config.expected_subprotocol();
        let found = session.subprotocol();

        if found.as_deref() != Some(expected) {
            let err = Error::Negotiation {
                expected: expected.to_string(),
                found,
            };
            warn!(session = %id, error = %err, "refusing session");
            if let Err(e) = session.close(err.close_reason()).await {
                warn!(session = %id, error = %e, "failed to close refused session");
            }
            return Err(err);
        }

        let mut connection = Self {
            id,
            session,
            config,
            registry: Registry::new(id),
            outbox: Vec::new(),
            state: ConnectionState::Open,
        };

        let published = match connection.registry.publish_globals(globals, &mut connection.outbox) {
            Ok(count) => count,
            Err(e) => return Err(connection.fail(e).await),
        };
        if let Err(e) = connection.flush().await {
            return Err(connection.fail(e).await);
        }

        info!(session = %id, globals = published, "connection opened");
        Ok(connection)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// Handles one inbound payload.
    ///
    /// On error the session has already been closed and the registry cleared by the
    /// time this returns; the error is handed back for the caller's records.
    pub async fn on_message(&mut self, payload: Payload) -> Result<()> {
        if self.state != ConnectionState::Open {
            warn!(session = %self.id, bytes = payload.len(), "dropping payload for closed connection");
            return Err(Error::Closed);
        }

        let result = match payload {
            Payload::Text(_) => Err(Error::UnexpectedText),
            Payload::Binary(packet) => self.process(&packet),
        };

        match result {
            Ok(()) => match self.flush().await {
                Ok(()) => Ok(()),
                Err(e) => Err(self.fail(e).await),
            },
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// The transport failed underneath this connection.
    pub async fn on_error(&mut self, cause: TransportError) {
        if self.state != ConnectionState::Open {
            debug!(session = %self.id, error = %cause, "transport error after close");
            return;
        }
        warn!(session = %self.id, error = %cause, "transport error");
        self.state = ConnectionState::Closing;

        let reason = Error::Transport(cause).close_reason();
        if let Err(e) = self.session.close(reason).await {
            debug!(session = %self.id, error = %e, "close after transport error failed");
        }
        self.finish();
    }

    /// The transport closed the session. Returns how many resources were released,
    /// which is zero for every call after the first.
    pub async fn on_close(&mut self) -> usize {
        if self.state != ConnectionState::Open {
            return 0;
        }
        self.state = ConnectionState::Closing;
        self.finish()
    }

    /// Closes the session from this side with a normal close code.
    pub async fn shutdown(&mut self) -> usize {
        if self.state != ConnectionState::Open {
            return 0;
        }
        self.state = ConnectionState::Closing;
        if let Err(e) = self.session.close(CloseReason::normal()).await {
            debug!(session = %self.id, error = %e, "close on shutdown failed");
        }
        self.finish()
    }

    /// Splits a binary payload and dispatches each message in order.
    fn process(&mut self, packet: &Packet) -> Result<()> {
        let limit = self.config.payload_limit();
        if packet.len() > limit {
            return Err(Error::PayloadTooLarge { size: packet.len(), limit });
        }

        let mut fds = packet.fds.iter().copied();
        for raw in westpack::split(&packet.bytes) {
            self.dispatch(raw?, &mut fds)?;
        }

        let unused = fds.count();
        if unused > 0 {
            debug!(session = %self.id, unused, "payload carried more fds than its messages took");
        }
        Ok(())
    }

    /// Resolves the target, decodes the arguments against the request signature,
    /// binds any new ids, and runs the handler.
    fn dispatch(&mut self, raw: RawMessage<'_>, fds: &mut impl Iterator<Item = Fd>) -> Result<()> {
        let resource = self.registry.lookup(raw.target())?.clone();
        let request = resource.request(raw.opcode())?;
        let message = raw.decode(request.signature(), fds)?;

        let mut new_ids = Vec::new();
        for arg in &message.args {
            let Arg::NewId(id) = arg else { continue };
            let creates = request.creates().ok_or_else(|| Error::MissingNewIdInterface {
                interface: resource.interface().name().to_string(),
                request: request.name().to_string(),
            })?;
            self.registry.bind_new_id(*id, creates.clone())?;
            new_ids.push(*id);
        }

        debug!(
            session = %self.id,
            object = %message.target,
            interface = resource.interface().name(),
            request = request.name(),
            opcode = message.opcode,
            "dispatch"
        );

        let mut ctx = Context::new(message.target, &new_ids, &mut self.registry, &mut self.outbox);
        request.invoke(&mut ctx, &message.args).map_err(|source| match source.downcast::<Error>() {
            Ok(err) => err,
            Err(source) => Error::Handler {
                object: message.target,
                request: request.name().to_string(),
                source,
            },
        })
    }

    /// Sends every queued event as one packet.
    ///
    /// An event that cannot be encoded is our own fault, not the peer's. The events
    /// queued before it still go out, and the error names its target.
    async fn flush(&mut self) -> Result<()> {
        if self.outbox.is_empty() {
            return Ok(());
        }
        let messages = std::mem::take(&mut self.outbox);
        let (packet, failed) = westpack::encode_prefix(&messages);

        if !packet.is_empty() {
            let sent = failed.as_ref().map_or(messages.len(), |(index, _)| *index);
            debug!(session = %self.id, messages = sent, bytes = packet.len(), "flush");
            self.session.send(packet).await?;
        }

        match failed {
            Some((index, source)) => Err(Error::Encode {
                object: messages[index].target,
                source,
            }),
            None => Ok(()),
        }
    }

    /// Ends the connection because of `err` and hands `err` back.
    ///
    /// Events queued before the failure are still delivered, followed by an error
    /// event on the root object when enabled. Then the session is closed with a
    /// reason naming the violation.
    async fn fail(&mut self, err: Error) -> Error {
        warn!(session = %self.id, error = %err, "closing connection");

        if !matches!(err, Error::Transport(_)) {
            if self.config.reports_errors() && err.code() != 0 {
                let object = err.object().unwrap_or(ObjectId::ROOT);
                self.outbox.push(Message::new(
                    ObjectId::ROOT,
                    ERROR_EVENT,
                    vec![Arg::Object(object), Arg::Uint(err.code()), Arg::String(err.to_string())],
                ));
            }
            if let Err(e) = self.flush().await {
                debug!(session = %self.id, error = %e, "could not deliver final events");
            }
        }

        self.state = ConnectionState::Closing;
        if let Err(e) = self.session.close(err.close_reason()).await {
            debug!(session = %self.id, error = %e, "close failed");
        }
        self.finish();
        err
    }

    /// Releases every resource and enters `Closed`.
    fn finish(&mut self) -> usize {
        let released = self.registry.clear();
        self.outbox.clear();
        self.state = ConnectionState::Closed;
        info!(session = %self.id, released, "connection closed");
        released
    }
}
