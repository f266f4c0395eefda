//! Interactive widgets. Their markup carries `data-event` so the browser
//! client knows which DOM event to forward as a `component_event`.

use std::sync::Arc;

use liveui_core::{Session, Widget};
use parking_lot::RwLock;

use crate::base::{escape_html, WidgetBase};

/// Clickable button. Fires `click` events.
pub struct Button {
    base: WidgetBase,
    label: RwLock<String>,
}

impl Button {
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            base: WidgetBase::new(),
            label: RwLock::new(label.into()),
        })
    }

    pub fn base(&self) -> &WidgetBase {
        &self.base
    }

    pub fn label(&self) -> String {
        self.label.read().clone()
    }

    /// Register a handler that only sees the session.
    pub fn on_click<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        self.base
            .add_callback(Arc::new(move |session: &Arc<Session>, _event: &str, _value: &str| {
                handler(session)
            }));
    }

    /// Simulate a click from server-side code.
    pub fn click(&self, session: &Arc<Session>) {
        self.trigger_callbacks(session, "click", "");
    }
}

impl Widget for Button {
    delegate_to_base!();

    fn kind(&self) -> &'static str {
        "button"
    }

    fn render(&self) -> String {
        let id = self.base.id();
        format!(
            r#"<button id="{id}" data-widget-id="{id}" data-event="click" class="lu-button">{}</button>"#,
            escape_html(&self.label.read())
        )
    }

    fn trigger_callbacks(&self, session: &Arc<Session>, event_type: &str, value: &str) {
        self.base.trigger(session, event_type, value);
    }
}

/// Single-line text input. Fires `change` events carrying the new value.
///
/// The widget itself may be shared by every session, so typed values are
/// kept in each session's state under [`TextInput::value_key`]. Rendering
/// only carries the initial value; the browser keeps its own field state.
pub struct TextInput {
    base: WidgetBase,
    label: String,
    placeholder: String,
    initial: String,
}

impl TextInput {
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Self::with_placeholder(label, "")
    }

    pub fn with_placeholder(label: impl Into<String>, placeholder: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            base: WidgetBase::new(),
            label: label.into(),
            placeholder: placeholder.into(),
            initial: String::new(),
        })
    }

    pub fn base(&self) -> &WidgetBase {
        &self.base
    }

    /// Session state key holding this input's last value.
    pub fn value_key(&self) -> String {
        format!("{}.value", self.base.id())
    }

    /// The value last typed in `session`, or the initial value.
    pub fn value(&self, session: &Session) -> String {
        session
            .get_as::<String>(&self.value_key())
            .unwrap_or_else(|| self.initial.clone())
    }

    pub fn on_input<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>, &str) + Send + Sync + 'static,
    {
        self.base
            .add_callback(Arc::new(move |session: &Arc<Session>, _event: &str, value: &str| {
                handler(session, value)
            }));
    }
}

impl Widget for TextInput {
    delegate_to_base!();

    fn kind(&self) -> &'static str {
        "text_input"
    }

    fn render(&self) -> String {
        let id = self.base.id();
        format!(
            concat!(
                r#"<div id="{id}" data-widget-id="{id}" class="lu-text-input">"#,
                r#"<label for="{id}-input">{label}</label>"#,
                r#"<input id="{id}-input" type="text" data-event="change" "#,
                r#"data-component-id="{id}" value="{value}" placeholder="{placeholder}">"#,
                "</div>"
            ),
            id = id,
            label = escape_html(&self.label),
            value = escape_html(&self.initial),
            placeholder = escape_html(&self.placeholder),
        )
    }

    /// The session's value tracks every `change` before callbacks run.
    fn trigger_callbacks(&self, session: &Arc<Session>, event_type: &str, value: &str) {
        if event_type == "change" {
            session.set(self.value_key(), value);
        }
        self.base.trigger(session, event_type, value);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_button_click_runs_handlers_in_order() {
        let session = Arc::new(Session::new("s1", None));
        let button = Button::new("Go");
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        button.on_click(move |_| first.lock().push(1));
        let second = Arc::clone(&order);
        button.on_click(move |_| second.lock().push(2));

        button.click(&session);
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn test_button_render() {
        let button = Button::new("Save & exit");
        let html = button.render();
        assert!(html.contains(r#"data-event="click""#));
        assert!(html.contains("Save &amp; exit"));
        assert_eq!(button.kind(), "button");
    }

    #[test]
    fn test_text_input_tracks_value_before_callbacks() {
        let session = Arc::new(Session::new("s1", None));
        let input = TextInput::new("Name");
        let seen = Arc::new(AtomicUsize::new(0));

        let tracked = Arc::clone(&input);
        let counter = Arc::clone(&seen);
        input.on_input(move |session, value| {
            assert_eq!(tracked.value(session), value);
            session.set("name", value);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        input.trigger_callbacks(&session, "change", "Ada");
        assert_eq!(input.value(&session), "Ada");
        assert_eq!(session.get_as::<String>("name").as_deref(), Some("Ada"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_text_input_keeps_values_per_session() {
        let alice = Arc::new(Session::new("alice", None));
        let bob = Arc::new(Session::new("bob", None));
        let input = TextInput::new("Name");

        input.trigger_callbacks(&alice, "change", "alice-secret");

        assert_eq!(input.value(&alice), "alice-secret");
        assert_eq!(input.value(&bob), "");
        assert!(!input.render().contains("alice-secret"));
    }

    #[test]
    fn test_focus_event_does_not_change_value() {
        let session = Arc::new(Session::new("s1", None));
        let input = TextInput::new("Name");
        input.trigger_callbacks(&session, "focus", "ignored");
        assert_eq!(input.value(&session), "");
        assert!(!session.has(&input.value_key()));
    }
}
