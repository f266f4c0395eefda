//! Browser side of LiveUI: the HTML page shell and the client script,
//! embedded with `rust-embed`.
//!
//! `debug-embed` is enabled, so debug builds embed `ui/` too and the binary
//! never depends on the working directory.

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use liveui_widgets::escape_html;
use rust_embed::Embed;
use tracing::warn;

#[derive(Embed)]
#[folder = "ui/"]
struct UiAssets;

const FALLBACK_SHELL: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>{{title}}</title></head>
<body data-session-id="{{session_id}}"><div id="app">{{content}}</div>
<script src="/static/client.js"></script></body></html>"#;

/// Fill the page shell. `content` is trusted widget markup; `title` and
/// `session_id` are escaped.
pub fn render_page(title: &str, content: &str, session_id: &str) -> String {
    let shell = match UiAssets::get("page.html") {
        Some(asset) => String::from_utf8_lossy(&asset.data).into_owned(),
        None => {
            warn!("page.html missing from embedded assets, using fallback shell");
            FALLBACK_SHELL.to_string()
        }
    };

    // content last, so markers inside widget markup are left alone
    shell
        .replace("{{title}}", &escape_html(title))
        .replace("{{session_id}}", &escape_html(session_id))
        .replace("{{content}}", content)
}

/// Serves `/static/{*path}` from the embedded `ui/` directory.
pub fn static_router() -> Router {
    Router::new().route("/static/{*path}", get(static_handler))
}

async fn static_handler(Path(path): Path<String>) -> Response {
    match UiAssets::get(&path) {
        Some(asset) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                asset.data.into_owned(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, Html("<h1>404</h1>")).into_response(),
    }
}
