//! Axum HTTP and WebSocket server.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Form, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use liveui_core::generate_session_id;
use liveui_core::protocol::ComponentEvent;

use crate::connection::handle_socket;
use crate::state::GatewayState;

/// Used when the OS cannot supply entropy for a fresh id.
pub const FALLBACK_SESSION_ID: &str = "default-session-id";

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId", alias = "session_id")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventForm {
    session_id: String,
    component_id: String,
    event_type: String,
    #[serde(default)]
    value: String,
}

/// Build the router. Exposed separately from [`serve`] for tests.
pub fn router(state: Arc<GatewayState>) -> Router {
    let app = Router::new()
        .route("/", get(page_handler))
        .route("/ws", get(ws_handler))
        .route("/event", post(event_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .merge(liveui_web::static_router());

    app.layer(TraceLayer::new_for_http())
}

/// Serve on an already bound listener.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    state: Arc<GatewayState>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    #[allow(unused_mut)]
    let mut app = router(Arc::clone(&state));

    #[cfg(feature = "metrics")]
    match crate::metrics::install_prometheus_recorder() {
        Ok(handle) => {
            let sessions = Arc::clone(state.hub.sessions());
            app = app.merge(crate::metrics::metrics_router(handle, sessions));
        }
        Err(e) => warn!(%e, "Metrics endpoint disabled"),
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn page_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<SessionQuery>,
) -> Html<String> {
    let session_id = match query.session_id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => generate_session_id().unwrap_or_else(|e| {
            warn!(%e, "Falling back to the shared session id");
            FALLBACK_SESSION_ID.to_string()
        }),
    };

    let content = state.render_widgets_for_session(&session_id);
    Html(liveui_web::render_page(
        &state.config.title(),
        &content,
        &session_id,
    ))
}

async fn ws_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<SessionQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing sessionId parameter").into_response();
    };

    let hub = Arc::clone(&state.hub);
    let settings = state.settings;
    ws.on_upgrade(move |socket| handle_socket(hub, session_id, socket, settings))
}

/// Form-post event path for clients without a socket. Returns the
/// re-rendered page content for the session.
async fn event_handler(
    State(state): State<Arc<GatewayState>>,
    Form(form): Form<EventForm>,
) -> Response {
    if form.session_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing session_id").into_response();
    }

    let session = state.hub.sessions().get_or_create(&form.session_id);
    let event = ComponentEvent {
        component_id: form.component_id,
        event_type: form.event_type,
        value: form.value,
    };
    state.hub.dispatch(&session, &event);

    Html(state.render_widgets_for_session(&form.session_id)).into_response()
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    axum::Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.hub.connection_count(),
        "sessions": state.hub.sessions().session_count(),
    }))
}

/// Resolves on Ctrl+C. If the handler cannot be installed, waits forever.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(%e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use liveui_core::config::Config;
    use liveui_widgets::{Button, Text};
    use tower::ServiceExt;

    use super::*;

    fn state() -> Arc<GatewayState> {
        Arc::new(GatewayState::new(Config::default()))
    }

    async fn body_text(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_page_uses_given_session() {
        let state = state();
        state.globals.add(Text::new("hello world"));

        let resp = router(Arc::clone(&state))
            .oneshot(Request::get("/?sessionId=abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains("hello world"));
        assert!(html.contains(r#"data-session-id="abc""#));
        assert!(state.hub.sessions().get("abc").is_some());
    }

    #[tokio::test]
    async fn test_page_generates_session_id() {
        let state = state();
        let resp = router(Arc::clone(&state))
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ids = state.hub.sessions().session_ids();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].len(), 32);
    }

    #[tokio::test]
    async fn test_event_post_runs_callback_and_renders() {
        let state = state();
        let button = Button::new("Count");
        button.on_click(|session| {
            let n = session.get_as::<u64>("n").unwrap_or(0) + 1;
            session.set("n", n);
        });
        state.globals.add(button.clone());

        let body = format!(
            "session_id=s1&component_id={}&event_type=click&value=",
            liveui_core::Widget::id(button.as_ref())
        );
        let resp = router(Arc::clone(&state))
            .oneshot(
                Request::post("/event")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("Count"));

        let session = state.hub.sessions().get("s1").unwrap();
        assert_eq!(session.get_as::<u64>("n"), Some(1));
    }

    #[tokio::test]
    async fn test_health_counts() {
        let state = state();
        state.hub.sessions().get_or_create("s1");
        let resp = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 1);
        assert_eq!(body["connections"], 0);
    }
}
