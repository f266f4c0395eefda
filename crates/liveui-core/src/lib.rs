//! Core types, config, errors, wire protocol, and session model for LiveUI.

pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod session_manager;
pub mod widget;

pub use error::{LiveUiError, Result};
pub use session::{Session, UpdateSink};
pub use session_manager::{generate_session_id, SessionManager};
pub use widget::{Widget, WidgetCallback};
