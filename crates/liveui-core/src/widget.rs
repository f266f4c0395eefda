//! The widget capability contract.
//!
//! The core never looks inside a widget beyond this trait. Concrete widget
//! kinds live in `liveui-widgets` or in application code.

use std::sync::Arc;

use crate::session::Session;

/// Change callback: `(session, event_type, value)`.
pub type WidgetCallback = Arc<dyn Fn(&Arc<Session>, &str, &str) + Send + Sync>;

/// A renderable, identifiable UI unit.
///
/// Widgets are shared as `Arc<dyn Widget>` between the global queue, session
/// lists and callbacks, so any mutable state must use interior mutability.
pub trait Widget: Send + Sync {
    /// Stable unique id, also used as the DOM id on the client.
    fn id(&self) -> &str;

    /// Widget kind, e.g. `"button"`.
    fn kind(&self) -> &'static str;

    /// Optional user-defined key.
    fn key(&self) -> Option<String> {
        None
    }

    /// Render to an HTML fragment.
    fn render(&self) -> String;

    fn is_visible(&self) -> bool {
        true
    }

    /// Register a change callback.
    fn on_change(&self, callback: WidgetCallback);

    /// Invoke every registered callback, in registration order.
    ///
    /// Implementations must not hold their callback lock while a callback
    /// runs: callbacks are free to register more callbacks or re-render.
    fn trigger_callbacks(&self, session: &Arc<Session>, event_type: &str, value: &str);
}

/// Concatenate the HTML of every visible widget, in order.
pub fn render_widgets(widgets: &[Arc<dyn Widget>]) -> String {
    widgets
        .iter()
        .filter(|w| w.is_visible())
        .map(|w| w.render())
        .collect()
}

/// Find a widget by id.
pub fn find_widget(widgets: &[Arc<dyn Widget>], id: &str) -> Option<Arc<dyn Widget>> {
    widgets.iter().find(|w| w.id() == id).cloned()
}
