//! Shared state handed to every HTTP and WebSocket handler.

use std::sync::Arc;

use liveui_core::config::Config;

use crate::connection::ConnectionSettings;
use crate::handler::{render_session, GlobalWidgets, WidgetEventHandler};
use crate::hub::Hub;

pub struct GatewayState {
    pub config: Config,
    pub hub: Arc<Hub>,
    pub globals: Arc<GlobalWidgets>,
    pub handler: Arc<WidgetEventHandler>,
    pub settings: ConnectionSettings,
}

impl GatewayState {
    pub fn new(config: Config) -> Self {
        let hub = Hub::new(&config);
        let globals = Arc::new(GlobalWidgets::default());
        let handler = Arc::new(WidgetEventHandler::new(Arc::clone(&globals)));
        hub.set_event_handler(handler.clone());
        let settings = ConnectionSettings::from_config(&config);

        Self {
            config,
            hub,
            globals,
            handler,
            settings,
        }
    }

    /// Render everything `session_id` should see, creating the session if needed.
    pub fn render_widgets_for_session(&self, session_id: &str) -> String {
        let session = self.hub.sessions().get_or_create(session_id);
        render_session(&self.globals, &session)
    }
}
