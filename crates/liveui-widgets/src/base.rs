//! State shared by every widget kind.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use liveui_core::{Session, WidgetCallback};
use parking_lot::{Mutex, RwLock};
use tracing::trace;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique widget id, `widget_<n>`.
pub fn next_widget_id() -> String {
    format!("widget_{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Escape text for inclusion in HTML content or a quoted attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Id, key, visibility, and callbacks.
pub struct WidgetBase {
    id: String,
    key: RwLock<Option<String>>,
    visible: AtomicBool,
    callbacks: Mutex<Vec<WidgetCallback>>,
}

impl Default for WidgetBase {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetBase {
    pub fn new() -> Self {
        Self::with_id(next_widget_id())
    }

    /// Use a caller-chosen id, e.g. to replace a widget in place.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: RwLock::new(None),
            visible: AtomicBool::new(true),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> Option<String> {
        self.key.read().clone()
    }

    pub fn set_key(&self, key: impl Into<String>) {
        *self.key.write() = Some(key.into());
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Relaxed);
    }

    pub fn add_callback(&self, callback: WidgetCallback) {
        self.callbacks.lock().push(callback);
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Run callbacks on a snapshot so they may register further callbacks.
    pub fn trigger(&self, session: &Arc<Session>, event_type: &str, value: &str) {
        let callbacks = self.callbacks.lock().clone();
        trace!(
            widget_id = %self.id,
            session_id = %session.id(),
            event_type,
            callbacks = callbacks.len(),
            "Running widget callbacks"
        );
        for callback in callbacks {
            callback(session, event_type, value);
        }
    }
}

/// Forward the bookkeeping half of `Widget` to a `base: WidgetBase` field.
macro_rules! delegate_to_base {
    () => {
        fn id(&self) -> &str {
            self.base.id()
        }

        fn key(&self) -> Option<String> {
            self.base.key()
        }

        fn is_visible(&self) -> bool {
            self.base.is_visible()
        }

        fn on_change(&self, callback: liveui_core::WidgetCallback) {
            self.base.add_callback(callback);
        }
    };
}
