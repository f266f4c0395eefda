//! The app `liveui serve` runs: a greeting form with a per-session reply.

use std::sync::Arc;

use liveui_core::{Session, Widget};
use liveui_gateway::App;
use liveui_widgets::Text;
use tracing::info;

const NAME_KEY: &str = "name";
const CLICKS_KEY: &str = "clicks";

fn greeting_id(session: &Session) -> String {
    format!("greeting-{}", session.id())
}

/// Insert or refresh the session's greeting line.
fn show_greeting(session: &Arc<Session>) {
    let name = session
        .get_as::<String>(NAME_KEY)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "stranger".to_string());
    let clicks = session.get_as::<u64>(CLICKS_KEY).unwrap_or(0);
    let id = greeting_id(session);
    let greeting = Text::with_id(&id, format!("Hello, {name}! ({clicks} clicks)"));

    if !session.add_widget_if_absent(greeting.clone()) {
        session.set_widget(greeting.clone());
        session.update_widget(&id, &greeting.render());
    }
}

pub fn build(app: &App) {
    app.title(app.state().config.title());
    app.text("Type a name and press Greet. Every tab of this session sees the reply.");

    let name = app.text_input("Name");
    name.on_input(|session, value| session.set(NAME_KEY, value));

    let greet = app.button("Greet");
    greet.on_click(|session| {
        let clicks = session.get_as::<u64>(CLICKS_KEY).unwrap_or(0) + 1;
        session.set(CLICKS_KEY, clicks);
        show_greeting(session);
    });

    let reset = app.button("Forget me");
    reset.on_click(|session| {
        session.clear();
        show_greeting(session);
    });

    app.set_login_callback(|session| info!(session_id = %session.id(), "Login event"));
    app.set_app_event_callback(|session, event| {
        info!(
            session_id = %session.id(),
            component_id = %event.component_id,
            "Unhandled component event"
        );
    });
}

#[cfg(test)]
mod tests {
    use liveui_core::config::Config;

    use super::*;

    #[test]
    fn test_greeting_is_added_then_replaced() {
        let app = App::new(Config::default());
        build(&app);

        let session = app.sessions().get_or_create("s1");
        session.set(NAME_KEY, "Ada");
        show_greeting(&session);
        show_greeting(&session);

        assert_eq!(session.widgets().len(), 1);
        let html = app.render_widgets_for_session("s1");
        assert!(html.contains("Hello, Ada!"));
        assert!(!app.render_widgets_for_session("s2").contains("Ada"));
    }
}
