//! One browser tab: a bounded outbound queue plus the read and write pumps
//! that move frames between the socket and the hub.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use liveui_core::config::Config;
use liveui_core::protocol::{Message, MessageType};

use crate::hub::Hub;

/// Per-connection tuning taken from the `connection` config section.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub queue_capacity: usize,
    pub ping_interval: Duration,
    pub write_timeout: Duration,
}

impl ConnectionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queue_capacity: config.queue_capacity(),
            ping_interval: config.ping_interval(),
            write_timeout: config.write_timeout(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct Connection {
    id: String,
    session_id: String,
    outbound: mpsc::Sender<Arc<str>>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl Connection {
    /// Create a connection bound to `session_id` with a queue of `capacity` frames.
    pub fn new(
        session_id: impl Into<String>,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Arc<str>>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let conn = Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            outbound,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        });
        (conn, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Queue a frame without waiting. Returns `false` and closes the
    /// connection if the queue is full or the writer is gone.
    pub fn send(&self, payload: Arc<str>) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.outbound.try_send(payload) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    session_id = %self.session_id,
                    connection_id = %self.id,
                    "Outbound queue full, dropping connection"
                );
                #[cfg(feature = "metrics")]
                crate::metrics::record_connection_dropped();
                self.close();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.close();
                false
            }
        }
    }

    fn send_message(&self, message: &Message) -> bool {
        match message.encode() {
            Ok(text) => self.send(Arc::from(text)),
            Err(e) => {
                warn!(%e, "Failed to encode frame");
                false
            }
        }
    }

    /// Close the connection. Both pumps observe this and exit. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.cancel.cancel();
            debug!(connection_id = %self.id, "Connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Read frames until the socket ends, errors, or the connection is closed.
pub async fn read_loop<S, E>(hub: Arc<Hub>, conn: Arc<Connection>, mut stream: S)
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    let cancel = conn.cancel_token();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };
        match next {
            Some(Ok(WsMessage::Text(text))) => handle_text(&hub, &conn, text.as_str()),
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(connection_id = %conn.id(), %e, "WebSocket read error");
                break;
            }
        }
    }
    conn.close();
}

fn handle_text(hub: &Hub, conn: &Connection, text: &str) {
    let mut message = match Message::decode(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(connection_id = %conn.id(), %e, "Ignoring malformed frame");
            return;
        }
    };
    // The connection, not the client, decides which session a frame belongs to
    message.session_id = conn.session_id().to_string();

    match message.kind {
        MessageType::Ping => {
            conn.send_message(&Message::pong(conn.session_id()));
        }
        MessageType::ComponentEvent => hub.handle_component_event(&message),
        other => debug!(connection_id = %conn.id(), kind = ?other, "Ignoring frame"),
    }
}

/// Drain the outbound queue into the socket and keep the link alive with pings.
///
/// Frames already queued when the writer wakes are written together and
/// flushed once.
pub async fn write_loop<K>(
    conn: Arc<Connection>,
    mut outbound: mpsc::Receiver<Arc<str>>,
    mut sink: K,
    settings: ConnectionSettings,
) where
    K: Sink<WsMessage> + Unpin,
    K::Error: Display,
{
    let cancel = conn.cancel_token();
    let period = settings.ping_interval.max(Duration::from_millis(1));
    let mut keepalive = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = outbound.recv() => {
                let Some(first) = next else { break };
                let mut batch = vec![first];
                while let Ok(more) = outbound.try_recv() {
                    batch.push(more);
                }
                let write = async {
                    for payload in batch {
                        sink.feed(WsMessage::Text(payload.as_ref().into())).await?;
                    }
                    sink.flush().await
                };
                match timeout(settings.write_timeout, write).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(connection_id = %conn.id(), %e, "WebSocket write error");
                        break;
                    }
                    Err(_) => {
                        warn!(connection_id = %conn.id(), "WebSocket write timed out");
                        break;
                    }
                }
            }
            _ = keepalive.tick() => {
                match timeout(settings.write_timeout, sink.send(WsMessage::Ping(Default::default()))).await {
                    Ok(Ok(())) => {}
                    _ => {
                        debug!(connection_id = %conn.id(), "Keep-alive ping failed");
                        break;
                    }
                }
            }
        }
    }

    conn.close();
    let _ = timeout(settings.write_timeout, sink.send(WsMessage::Close(None))).await;
}

/// Serve one upgraded socket until either side hangs up.
pub async fn handle_socket(
    hub: Arc<Hub>,
    session_id: String,
    socket: WebSocket,
    settings: ConnectionSettings,
) {
    let (conn, outbound) = Connection::new(session_id, settings.queue_capacity);
    hub.register(Arc::clone(&conn)).await;
    #[cfg(feature = "metrics")]
    crate::metrics::record_ws_connect();
    info!(session_id = %conn.session_id(), connection_id = %conn.id(), "WebSocket connected");

    // A reconnecting tab gets the whole page again, possibly into a fresh session
    let session = hub.sessions().get_or_create(conn.session_id());
    if let Some(html) = hub.render_snapshot(&session) {
        conn.send_message(&Message::ui_update(conn.session_id(), &html));
    }

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), outbound, sink, settings));
    read_loop(Arc::clone(&hub), Arc::clone(&conn), stream).await;

    conn.close();
    if let Err(e) = writer.await {
        warn!(%e, "Writer task failed");
    }
    hub.unregister(Arc::clone(&conn)).await;
    #[cfg(feature = "metrics")]
    crate::metrics::record_ws_disconnect();
    info!(session_id = %conn.session_id(), connection_id = %conn.id(), "WebSocket disconnected");
}
