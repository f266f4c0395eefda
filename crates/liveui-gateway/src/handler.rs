//! Component event routing.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use liveui_core::protocol::ComponentEvent;
use liveui_core::widget::{find_widget, render_widgets};
use liveui_core::{Session, Widget};

/// Receives every `component_event` the hub resolves to a session.
///
/// Called on the connection's read task, so implementations must not block.
pub trait EventHandler: Send + Sync {
    fn handle_component_event(&self, session: &Arc<Session>, event: &ComponentEvent);

    /// Markup sent as `ui_update` when a tab connects. `None` sends nothing.
    fn render_snapshot(&self, _session: &Arc<Session>) -> Option<String> {
        None
    }
}

pub type LoginCallback = Arc<dyn Fn(&Arc<Session>) + Send + Sync>;
pub type AppEventCallback = Arc<dyn Fn(&Arc<Session>, &ComponentEvent) + Send + Sync>;

/// Widgets shown to every session, ahead of the session's own widgets.
#[derive(Default)]
pub struct GlobalWidgets {
    widgets: RwLock<Vec<Arc<dyn Widget>>>,
}

impl GlobalWidgets {
    pub fn add(&self, widget: Arc<dyn Widget>) {
        self.widgets.write().push(widget);
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn Widget>> {
        self.widgets.read().clone()
    }

    pub fn find(&self, id: &str) -> Option<Arc<dyn Widget>> {
        find_widget(&self.widgets.read(), id)
    }

    pub fn clear(&self) {
        self.widgets.write().clear();
    }
}

/// Global widgets followed by the session's widgets. Each list is
/// snapshotted on its own so rendering never holds a lock.
pub fn render_session(globals: &GlobalWidgets, session: &Session) -> String {
    let mut html = render_widgets(&globals.snapshot());
    html.push_str(&render_widgets(&session.widgets()));
    html
}

/// Routes events to widget callbacks, session widgets first.
///
/// A `login` event additionally runs the login hook after the widget's own
/// callbacks. Events for ids nobody owns go to the app-level callback.
pub struct WidgetEventHandler {
    globals: Arc<GlobalWidgets>,
    on_login: RwLock<Option<LoginCallback>>,
    on_app_event: RwLock<Option<AppEventCallback>>,
}

impl WidgetEventHandler {
    pub fn new(globals: Arc<GlobalWidgets>) -> Self {
        Self {
            globals,
            on_login: RwLock::new(None),
            on_app_event: RwLock::new(None),
        }
    }

    pub fn set_login_callback(&self, callback: LoginCallback) {
        *self.on_login.write() = Some(callback);
    }

    pub fn set_app_event_callback(&self, callback: AppEventCallback) {
        *self.on_app_event.write() = Some(callback);
    }
}

impl EventHandler for WidgetEventHandler {
    fn handle_component_event(&self, session: &Arc<Session>, event: &ComponentEvent) {
        info!(
            session_id = %session.id(),
            component_id = %event.component_id,
            event_type = %event.event_type,
            "Component event"
        );

        let target = session
            .find_widget(&event.component_id)
            .or_else(|| self.globals.find(&event.component_id));

        match target {
            Some(widget) => {
                widget.trigger_callbacks(session, &event.event_type, &event.value);
                if event.event_type == "login" {
                    let hook = self.on_login.read().clone();
                    if let Some(hook) = hook {
                        hook(session);
                    }
                }
            }
            None => {
                let fallback = self.on_app_event.read().clone();
                match fallback {
                    Some(callback) => callback(session, event),
                    None => debug!(
                        component_id = %event.component_id,
                        "No widget or app handler for event"
                    ),
                }
            }
        }
    }

    fn render_snapshot(&self, session: &Arc<Session>) -> Option<String> {
        Some(render_session(&self.globals, session))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use liveui_widgets::{Button, Text};

    use super::*;

    fn event(component_id: &str, event_type: &str) -> ComponentEvent {
        ComponentEvent {
            component_id: component_id.to_string(),
            event_type: event_type.to_string(),
            value: String::new(),
        }
    }

    #[test]
    fn test_session_widget_wins_over_global() {
        let globals = Arc::new(GlobalWidgets::default());
        let handler = WidgetEventHandler::new(Arc::clone(&globals));
        let session = Arc::new(Session::new("s1", None));

        let button = Button::new("Go");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        button.on_click(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        globals.add(button.clone());
        session.add_widget(button.clone());

        handler.handle_component_event(&session, &event(button.id(), "click"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_login_hook_runs_after_widget() {
        let globals = Arc::new(GlobalWidgets::default());
        let handler = WidgetEventHandler::new(Arc::clone(&globals));
        let session = Arc::new(Session::new("s1", None));

        let button = Button::new("Sign in");
        button.on_click(|session| session.set("clicked", true));
        globals.add(button.clone());

        handler.set_login_callback(Arc::new(|session: &Arc<Session>| {
            assert!(session.has("clicked"));
            session.set("logged_in", true);
        }));

        handler.handle_component_event(&session, &event(button.id(), "login"));
        assert_eq!(session.get_as::<bool>("logged_in"), Some(true));
    }

    #[test]
    fn test_unknown_component_goes_to_app_callback() {
        let handler = WidgetEventHandler::new(Arc::new(GlobalWidgets::default()));
        let session = Arc::new(Session::new("s1", None));
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        handler.set_app_event_callback(Arc::new(
            move |_session: &Arc<Session>, event: &ComponentEvent| {
                sink.lock().push(event.component_id.clone());
            },
        ));

        handler.handle_component_event(&session, &event("nav-home", "click"));
        assert_eq!(*seen.lock(), vec!["nav-home".to_string()]);
    }

    #[test]
    fn test_unknown_component_without_callback_is_ignored() {
        let handler = WidgetEventHandler::new(Arc::new(GlobalWidgets::default()));
        let session = Arc::new(Session::new("s1", None));
        handler.handle_component_event(&session, &event("missing", "click"));
    }

    #[test]
    fn test_snapshot_puts_globals_first() {
        let globals = Arc::new(GlobalWidgets::default());
        globals.add(Text::new("global"));
        let handler = WidgetEventHandler::new(Arc::clone(&globals));
        let session = Arc::new(Session::new("s1", None));
        session.add_widget(Text::new("personal"));

        let html = handler.render_snapshot(&session).unwrap();
        let global_at = html.find("global").unwrap();
        let personal_at = html.find("personal").unwrap();
        assert!(global_at < personal_at);
    }
}
