//! Per-user session state: key/value store plus a private widget list.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::widget::Widget;

/// Push-capable capability a session uses to reach its live connections.
///
/// Implemented by the connection hub. Sessions only hold a `Weak` reference,
/// so a sink going away simply turns pushes into no-ops.
pub trait UpdateSink: Send + Sync {
    fn send_partial_update(&self, session_id: &str, component_id: &str, html: &str);
    fn send_add_widget(&self, session_id: &str, component_id: &str, html: &str);
    fn send_error(&self, session_id: &str, message: &str, code: &str);
}

/// State and widget ownership scope for one user/browser context.
///
/// The key/value store and the widget list sit behind separate locks and no
/// method holds both. Pushes to the sink happen after the list lock is
/// released.
pub struct Session {
    id: String,
    state: RwLock<HashMap<String, Value>>,
    widgets: RwLock<Vec<Arc<dyn Widget>>>,
    created_at: DateTime<Utc>,
    last_accessed: Mutex<Instant>,
    sink: Option<Weak<dyn UpdateSink>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("widgets", &self.widgets.read().len())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(id: impl Into<String>, sink: Option<Weak<dyn UpdateSink>>) -> Self {
        Self {
            id: id.into(),
            state: RwLock::new(HashMap::new()),
            widgets: RwLock::new(Vec::new()),
            created_at: Utc::now(),
            last_accessed: Mutex::new(Instant::now()),
            sink,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> Instant {
        *self.last_accessed.lock()
    }

    /// Time since the session was last read or written.
    pub fn idle_for(&self) -> Duration {
        self.last_accessed.lock().elapsed()
    }

    /// Like [`Session::idle_for`] but gives up instead of waiting on a busy clock.
    pub(crate) fn try_idle_for(&self) -> Option<Duration> {
        self.last_accessed.try_lock().map(|t| t.elapsed())
    }

    fn touch(&self) {
        *self.last_accessed.lock() = Instant::now();
    }

    fn sink(&self) -> Option<Arc<dyn UpdateSink>> {
        let sink = self.sink.as_ref().and_then(Weak::upgrade);
        if sink.is_none() {
            debug!(session_id = %self.id, "No update sink, skipping push");
        }
        sink
    }

    // --- key/value state ---

    pub fn get(&self, key: &str) -> Option<Value> {
        self.touch();
        self.state.read().get(key).cloned()
    }

    /// Typed read; `None` when absent or of a different shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.state.write().insert(key.into(), value.into());
        self.touch();
    }

    pub fn delete(&self, key: &str) {
        self.state.write().remove(key);
        self.touch();
    }

    pub fn has(&self, key: &str) -> bool {
        self.touch();
        self.state.read().contains_key(key)
    }

    pub fn clear(&self) {
        self.state.write().clear();
        self.touch();
    }

    // --- private widgets ---

    /// Append a widget and push an `add_widget` frame to the session's connections.
    pub fn add_widget(&self, widget: Arc<dyn Widget>) {
        self.widgets.write().push(Arc::clone(&widget));
        self.touch();

        if let Some(sink) = self.sink() {
            let html = widget.render();
            sink.send_add_widget(&self.id, widget.id(), &html);
        }
    }

    /// Append `widget` unless one with the same id is already present, as one
    /// step under the widget lock. Pushes `add_widget` only when it inserts.
    pub fn add_widget_if_absent(&self, widget: Arc<dyn Widget>) -> bool {
        {
            let mut widgets = self.widgets.write();
            if widgets.iter().any(|w| w.id() == widget.id()) {
                return false;
            }
            widgets.push(Arc::clone(&widget));
        }
        self.touch();

        if let Some(sink) = self.sink() {
            let html = widget.render();
            sink.send_add_widget(&self.id, widget.id(), &html);
        }
        true
    }

    /// Replace the widget with the same id. No push; absent ids are ignored.
    pub fn set_widget(&self, widget: Arc<dyn Widget>) {
        {
            let mut widgets = self.widgets.write();
            if let Some(slot) = widgets.iter_mut().find(|w| w.id() == widget.id()) {
                *slot = widget;
            }
        }
        self.touch();
    }

    /// Remove the widget with the given id. Absent ids are ignored.
    pub fn delete_widget(&self, id: &str) {
        self.widgets.write().retain(|w| w.id() != id);
        self.touch();
    }

    /// Alias of [`Session::delete_widget`].
    pub fn remove_widget(&self, id: &str) {
        self.delete_widget(id);
    }

    pub fn clear_widgets(&self) {
        self.widgets.write().clear();
        self.touch();
    }

    /// Snapshot of the private widget list in render order.
    pub fn widgets(&self) -> Vec<Arc<dyn Widget>> {
        self.touch();
        self.widgets.read().clone()
    }

    pub fn find_widget(&self, id: &str) -> Option<Arc<dyn Widget>> {
        self.widgets.read().iter().find(|w| w.id() == id).cloned()
    }

    /// Push a `partial_update` for one component without touching the list.
    pub fn update_widget(&self, component_id: &str, html: &str) {
        self.touch();
        if let Some(sink) = self.sink() {
            sink.send_partial_update(&self.id, component_id, html);
        }
    }

    /// Push an `error` frame to this session's connections.
    pub fn notify_error(&self, message: &str, code: &str) {
        if let Some(sink) = self.sink() {
            sink.send_error(&self.id, message, code);
        }
    }
}
