//! # Server
//!
//! The session table a transport adapter talks to. Each accepted session gets a
//! `Connection` driven by its own task, fed through an unbounded channel.
//!
//! ## Invariants
//! - Events for one session are handled in the order the adapter delivered them.
//! - A connection that closes itself removes its own table entry, and never an
//!   entry a later session with the same id has taken.
//! - A session id is reserved before the connection opens, so two concurrent opens
//!   of one id cannot both succeed.
//! - Connections share the globals and config, never a registry or an id counter.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::Config;
use crate::connection::Connection;
use crate::error::Error;
use crate::error::Result;
use crate::global::Globals;
use crate::session::Payload;
use crate::session::Session;
use crate::session::SessionId;
use crate::session::TransportError;

enum Event {
    Message(Payload),
    Error(TransportError),
    Close,
    Shutdown,
}

struct ConnectionHandle {
    /// Tells apart successive sessions that reuse one id.
    token: u64,
    events: mpsc::UnboundedSender<Event>,
    /// Empty while the connection is still opening.
    task: Option<JoinHandle<()>>,
}

/// Routes transport callbacks to per-session connections.
pub struct Server {
    config: Arc<Config>,
    globals: Arc<Globals>,
    sessions: Arc<DashMap<SessionId, ConnectionHandle>>,
    next_token: AtomicU64,
}

impl Server {
    pub fn new(globals: Globals) -> Self {
        Self::with_config(globals, Config::default())
    }

    pub fn with_config(globals: Globals, config: Config) -> Self {
        Self {
            config: Arc::new(config),
            globals: Arc::new(globals),
            sessions: Arc::new(DashMap::new()),
            next_token: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Accepts a new session.
    ///
    /// The globals have been delivered by the time this returns. A refused session
    /// is closed and never enters the table.
    pub async fn on_open(&self, session: Arc<dyn Session>) -> Result<()> {
        let id = session.id();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (events, rx) = mpsc::unbounded_channel();

        match self.sessions.entry(id) {
            Entry::Occupied(_) => return Err(Error::SessionExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(ConnectionHandle { token, events, task: None });
            }
        }

        let connection = match Connection::open(session, &self.globals, self.config.clone()).await {
            Ok(connection) => connection,
            Err(e) => {
                self.sessions.remove_if(&id, |_, handle| handle.token == token);
                return Err(e);
            }
        };
        let task = tokio::spawn(drive(connection, rx, token, self.sessions.clone()));

        // the connection may already have closed and left the table
        if let Some(mut handle) = self.sessions.get_mut(&id) {
            if handle.token == token {
                handle.task = Some(task);
            }
        }
        info!(session = %id, connections = self.sessions.len(), "session accepted");
        Ok(())
    }

    /// Queues an inbound payload for its connection.
    pub fn on_message(&self, id: SessionId, payload: Payload) -> Result<()> {
        self.route(id, Event::Message(payload))
    }

    /// Reports a transport failure. The connection closes itself.
    pub fn on_error(&self, id: SessionId, cause: TransportError) -> Result<()> {
        self.route(id, Event::Error(cause))
    }

    /// The transport closed the session.
    ///
    /// Waits for the connection to finish its teardown. Returns `false` when no
    /// connection was registered, which is the case after it already closed itself.
    pub async fn on_close(&self, id: SessionId) -> bool {
        let Some((_, handle)) = self.sessions.remove(&id) else {
            debug!(session = %id, "close for unknown session");
            return false;
        };
        Self::stop(id, handle, Event::Close).await;
        true
    }

    /// Closes every session with a normal close code and waits for the teardowns.
    pub async fn shutdown(&self) {
        let ids = self.clients();
        info!(connections = ids.len(), "shutting down");
        for id in ids {
            if let Some((_, handle)) = self.sessions.remove(&id) {
                Self::stop(id, handle, Event::Shutdown).await;
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Every session with a live connection.
    pub fn clients(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn is_connected(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    fn route(&self, id: SessionId, event: Event) -> Result<()> {
        let handle = self.sessions.get(&id).ok_or(Error::UnknownSession(id))?;
        handle.events.send(event).map_err(|_| Error::Closed)
    }

    async fn stop(id: SessionId, handle: ConnectionHandle, event: Event) {
        // the task may already have exited on its own
        let _ = handle.events.send(event);
        drop(handle.events);
        let Some(task) = handle.task else { return };
        if let Err(e) = task.await {
            warn!(session = %id, error = %e, "connection task failed");
        }
    }
}

/// Runs one connection until it closes.
async fn drive(
    mut connection: Connection,
    mut events: mpsc::UnboundedReceiver<Event>,
    token: u64,
    sessions: Arc<DashMap<SessionId, ConnectionHandle>>,
) {
    let id = connection.id();

    while let Some(event) = events.recv().await {
        match event {
            Event::Message(payload) => {
                if let Err(e) = connection.on_message(payload).await {
                    debug!(session = %id, error = %e, "message ended the connection");
                }
            }
            Event::Error(cause) => connection.on_error(cause).await,
            Event::Close => {
                connection.on_close().await;
            }
            Event::Shutdown => {
                connection.shutdown().await;
            }
        }

        if connection.is_closed() {
            break;
        }
    }

    // every sender is gone without an explicit close
    connection.on_close().await;
    sessions.remove_if(&id, |_, handle| handle.token == token);
}
