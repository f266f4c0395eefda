//! Prometheus metrics recording and endpoint.

use std::sync::Arc;

use axum::{routing::get, Router};
use liveui_core::SessionManager;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder. Fails if one is already installed in
/// this process.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// `GET /metrics` in Prometheus text format. Session figures are sampled
/// from the manager on each scrape.
pub fn metrics_router(handle: PrometheusHandle, sessions: Arc<SessionManager>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            record_sessions(&sessions);
            std::future::ready(handle.render())
        }),
    )
}

fn record_sessions(sessions: &SessionManager) {
    metrics::gauge!("sessions_active").set(sessions.session_count() as f64);
    metrics::counter!("sessions_created_total").absolute(sessions.sessions_created());
    metrics::counter!("sessions_expired_total").absolute(sessions.sessions_expired());
}

pub fn record_ws_connect() {
    metrics::gauge!("ws_connections_active").increment(1.0);
}

pub fn record_ws_disconnect() {
    metrics::gauge!("ws_connections_active").decrement(1.0);
}

/// A connection was dropped because its outbound queue filled up.
pub fn record_connection_dropped() {
    metrics::counter!("ws_connections_dropped_total").increment(1);
}

pub fn record_component_event(event_type: &str) {
    let labels = [("event_type", event_type.to_string())];
    metrics::counter!("component_events_total", &labels).increment(1);
}
