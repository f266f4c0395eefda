//! Application facade: the global widget list, app-level callbacks, and
//! the server lifecycle.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use liveui_core::config::Config;
use liveui_core::protocol::ComponentEvent;
use liveui_core::{Session, SessionManager, Widget};
use liveui_widgets::{Button, Header, Text, TextInput, Title};

use crate::hub::Hub;
use crate::server::{serve, shutdown_signal};
use crate::state::GatewayState;

pub struct App {
    state: Arc<GatewayState>,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            state: Arc::new(GatewayState::new(config)),
        }
    }

    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.state.hub
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        self.state.hub.sessions()
    }

    /// Append a widget shown to every session.
    pub fn add_widget(&self, widget: Arc<dyn Widget>) {
        self.state.globals.add(widget);
    }

    pub fn widgets(&self) -> Vec<Arc<dyn Widget>> {
        self.state.globals.snapshot()
    }

    pub fn title(&self, text: impl Into<String>) -> Arc<Title> {
        let widget = Title::new(text);
        self.add_widget(widget.clone());
        widget
    }

    pub fn header(&self, text: impl Into<String>) -> Arc<Header> {
        let widget = Header::new(text);
        self.add_widget(widget.clone());
        widget
    }

    pub fn text(&self, text: impl Into<String>) -> Arc<Text> {
        let widget = Text::new(text);
        self.add_widget(widget.clone());
        widget
    }

    pub fn button(&self, label: impl Into<String>) -> Arc<Button> {
        let widget = Button::new(label);
        self.add_widget(widget.clone());
        widget
    }

    pub fn text_input(&self, label: impl Into<String>) -> Arc<TextInput> {
        let widget = TextInput::new(label);
        self.add_widget(widget.clone());
        widget
    }

    /// Called after a widget fires a `login` event.
    pub fn set_login_callback<F>(&self, callback: F)
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        self.state.handler.set_login_callback(Arc::new(callback));
    }

    /// Called for events whose component id matches no widget.
    pub fn set_app_event_callback<F>(&self, callback: F)
    where
        F: Fn(&Arc<Session>, &ComponentEvent) + Send + Sync + 'static,
    {
        self.state.handler.set_app_event_callback(Arc::new(callback));
    }

    pub fn render_widgets_for_session(&self, session_id: &str) -> String {
        self.state.render_widgets_for_session(session_id)
    }

    /// Drop all global widgets and push a fresh full render to every
    /// connected session.
    pub fn rerun(&self) {
        self.state.globals.clear();
        let hub = &self.state.hub;
        for session_id in hub.active_sessions() {
            let html = self.state.render_widgets_for_session(&session_id);
            hub.send_ui_update(&session_id, &html);
        }
    }

    /// Serve until Ctrl+C.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves, then stop the sweeper and the hub.
    pub async fn run_until<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.address();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(title = %self.state.config.title(), "LiveUI listening on http://{addr}/");
        self.run_on(listener, shutdown).await
    }

    /// Like [`App::run_until`] on an already bound listener.
    pub async fn run_on<F>(&self, listener: tokio::net::TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let hub_task = self.state.hub.start(cancel.clone());
        self.sessions().start();

        let result = serve(listener, Arc::clone(&self.state), shutdown).await;

        self.sessions().stop().await;
        cancel.cancel();
        if let Some(task) = hub_task {
            if let Err(e) = task.await {
                warn!(%e, "Hub task failed");
            }
        }
        info!("LiveUI stopped");
        result
    }
}
