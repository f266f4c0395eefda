//! LiveUI gateway: the connection hub, per-tab WebSocket pumps, event
//! routing, and the axum server that ties them to the session model.

pub mod app;
pub mod connection;
pub mod handler;
pub mod hub;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod state;

pub use app::App;
pub use connection::{Connection, ConnectionSettings};
pub use handler::{EventHandler, GlobalWidgets, WidgetEventHandler};
pub use hub::Hub;
pub use server::{router, serve};
pub use state::GatewayState;
