//! Connection hub: the registry of live connections grouped by session.
//!
//! The registry is written only by the hub task, which drains a single
//! command channel (register, unregister, broadcast). Session-targeted sends
//! read the registry directly and never wait on a connection: each queue is
//! bounded and a full queue closes that connection instead of blocking.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use liveui_core::config::Config;
use liveui_core::protocol::{ComponentEvent, Message};
use liveui_core::{Session, SessionManager, UpdateSink};

use crate::connection::Connection;
use crate::handler::EventHandler;

enum HubCommand {
    Register(Arc<Connection>, Option<oneshot::Sender<()>>),
    Unregister(Arc<Connection>, Option<oneshot::Sender<()>>),
    Broadcast(Arc<str>),
}

type Registry = HashMap<String, HashMap<String, Arc<Connection>>>;

pub struct Hub {
    clients: RwLock<Registry>,
    commands: mpsc::UnboundedSender<HubCommand>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<HubCommand>>>,
    sessions: Arc<SessionManager>,
    handler: RwLock<Option<Arc<dyn EventHandler>>>,
}

impl Hub {
    /// Build a hub and the session manager it owns. Sessions push updates
    /// back through the hub via a weak reference.
    pub fn new(config: &Config) -> Arc<Self> {
        let (commands, inbox) = mpsc::unbounded_channel();
        Arc::new_cyclic(|weak: &Weak<Hub>| {
            let sink = weak.clone() as Weak<dyn UpdateSink>;
            Hub {
                clients: RwLock::new(HashMap::new()),
                commands,
                inbox: Mutex::new(Some(inbox)),
                sessions: Arc::new(SessionManager::from_config(config, Some(sink))),
                handler: RwLock::new(None),
            }
        })
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn set_event_handler(&self, handler: Arc<dyn EventHandler>) {
        *self.handler.write() = Some(handler);
    }

    fn event_handler(&self) -> Option<Arc<dyn EventHandler>> {
        self.handler.read().clone()
    }

    /// Spawn the hub task. It runs until `cancel` fires.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let Some(mut inbox) = self.inbox.lock().take() else {
            warn!("Hub already started");
            return None;
        };

        let hub = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    command = inbox.recv() => {
                        let Some(command) = command else { break };
                        hub.apply(command);
                    }
                }
            }
            hub.close_all();
            debug!("Hub stopped");
        }))
    }

    fn apply(&self, command: HubCommand) {
        match command {
            HubCommand::Register(conn, ack) => {
                self.insert(conn);
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
            HubCommand::Unregister(conn, ack) => {
                self.remove(&conn);
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
            HubCommand::Broadcast(payload) => {
                self.fan_out(None, &payload);
            }
        }
    }

    fn insert(&self, conn: Arc<Connection>) {
        let (session_count, total) = {
            let mut clients = self.clients.write();
            let set = clients.entry(conn.session_id().to_string()).or_default();
            set.insert(conn.id().to_string(), Arc::clone(&conn));
            let session_count = set.len();
            (session_count, clients.values().map(HashMap::len).sum::<usize>())
        };
        info!(
            session_id = %conn.session_id(),
            connection_id = %conn.id(),
            session_connections = session_count,
            total,
            "Client registered"
        );
    }

    fn remove(&self, conn: &Arc<Connection>) {
        let removed = {
            let mut clients = self.clients.write();
            match clients.get_mut(conn.session_id()) {
                Some(set) => {
                    let removed = set.remove(conn.id()).is_some();
                    if set.is_empty() {
                        clients.remove(conn.session_id());
                    }
                    removed
                }
                None => false,
            }
        };
        conn.close();
        if removed {
            info!(
                session_id = %conn.session_id(),
                connection_id = %conn.id(),
                "Client unregistered"
            );
        }
    }

    fn close_all(&self) {
        let drained: Vec<Arc<Connection>> = self
            .clients
            .write()
            .drain()
            .flat_map(|(_, set)| set.into_values())
            .collect();
        for conn in drained {
            conn.close();
        }
    }

    /// Send `payload` to one session's connections, or to everyone when
    /// `session_id` is `None`. Connections that cannot take the frame are
    /// closed and queued for unregistration once the read lock is gone.
    fn fan_out(&self, session_id: Option<&str>, payload: &Arc<str>) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let clients = self.clients.read();
            let targets: Box<dyn Iterator<Item = &Arc<Connection>> + '_> = match session_id {
                Some(id) => match clients.get(id) {
                    Some(set) => Box::new(set.values()),
                    None => {
                        debug!(session_id = %id, "No connections for session");
                        return 0;
                    }
                },
                None => Box::new(clients.values().flat_map(HashMap::values)),
            };
            for conn in targets {
                if conn.send(Arc::clone(payload)) {
                    delivered += 1;
                } else {
                    dead.push(Arc::clone(conn));
                }
            }
        }

        for conn in dead {
            self.schedule_unregister(conn);
        }
        delivered
    }

    fn encode(message: &Message) -> Option<Arc<str>> {
        match message.encode() {
            Ok(text) => Some(Arc::from(text)),
            Err(e) => {
                warn!(%e, "Failed to encode frame");
                None
            }
        }
    }

    /// Register a connection and wait until the hub task has applied it.
    pub async fn register(&self, conn: Arc<Connection>) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(HubCommand::Register(conn, Some(ack))).is_err() {
            warn!("Hub is not running, registration dropped");
            return;
        }
        let _ = done.await;
    }

    /// Unregister a connection and wait until it is out of the registry.
    pub async fn unregister(&self, conn: Arc<Connection>) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(HubCommand::Unregister(conn, Some(ack))).is_err() {
            return;
        }
        let _ = done.await;
    }

    fn schedule_unregister(&self, conn: Arc<Connection>) {
        let _ = self.commands.send(HubCommand::Unregister(conn, None));
    }

    /// Queue a frame for every connection of every session.
    pub fn broadcast(&self, message: &Message) {
        if let Some(payload) = Self::encode(message) {
            let _ = self.commands.send(HubCommand::Broadcast(payload));
        }
    }

    /// Send a frame to every connection of `session_id`. Returns how many
    /// connections accepted it.
    pub fn send_to_session(&self, session_id: &str, message: &Message) -> usize {
        match Self::encode(message) {
            Some(payload) => self.fan_out(Some(session_id), &payload),
            None => 0,
        }
    }

    pub fn send_ui_update(&self, session_id: &str, html: &str) -> usize {
        self.send_to_session(session_id, &Message::ui_update(session_id, html))
    }

    /// Hand a decoded `component_event` frame to the event handler.
    ///
    /// The session must already exist: events for an expired session are
    /// dropped, and the client gets a fresh session on its next connect.
    pub fn handle_component_event(&self, message: &Message) {
        let event = match message.component_event_data() {
            Ok(event) => event,
            Err(e) => {
                warn!(session_id = %message.session_id, %e, "Dropping malformed component event");
                return;
            }
        };
        let Some(session) = self.sessions.get(&message.session_id) else {
            warn!(
                session_id = %message.session_id,
                component_id = %event.component_id,
                "Event for unknown session dropped"
            );
            return;
        };
        self.dispatch(&session, &event);
    }

    /// Run the event handler for `event` on `session`.
    pub fn dispatch(&self, session: &Arc<Session>, event: &ComponentEvent) {
        match self.event_handler() {
            Some(handler) => {
                handler.handle_component_event(session, event);
                #[cfg(feature = "metrics")]
                crate::metrics::record_component_event(&event.event_type);
            }
            None => debug!(
                session_id = %session.id(),
                component_id = %event.component_id,
                "No event handler installed, event dropped"
            ),
        }
    }

    /// Full markup for `session`, if a handler can produce it.
    pub fn render_snapshot(&self, session: &Arc<Session>) -> Option<String> {
        self.event_handler()?.render_snapshot(session)
    }

    pub fn connection_count(&self) -> usize {
        self.clients.read().values().map(HashMap::len).sum()
    }

    pub fn session_connection_count(&self, session_id: &str) -> usize {
        self.clients.read().get(session_id).map_or(0, HashMap::len)
    }

    /// Sessions with at least one open connection.
    pub fn active_sessions(&self) -> Vec<String> {
        self.clients.read().keys().cloned().collect()
    }
}

impl UpdateSink for Hub {
    fn send_partial_update(&self, session_id: &str, component_id: &str, html: &str) {
        self.send_to_session(
            session_id,
            &Message::partial_update(session_id, component_id, html),
        );
    }

    fn send_add_widget(&self, session_id: &str, component_id: &str, html: &str) {
        self.send_to_session(
            session_id,
            &Message::add_widget(session_id, component_id, html),
        );
    }

    fn send_error(&self, session_id: &str, message: &str, code: &str) {
        self.send_to_session(session_id, &Message::error(session_id, message, code));
    }
}
