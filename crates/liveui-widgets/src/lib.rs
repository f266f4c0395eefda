//! Built-in widgets.
//!
//! Each widget renders to an HTML fragment whose root element carries the
//! widget id in both `id` and `data-widget-id`, which is what the browser
//! client targets for partial updates.

#[macro_use]
mod base;
pub mod input;
pub mod text;

pub use base::{escape_html, next_widget_id, WidgetBase};
pub use input::{Button, TextInput};
pub use text::{Header, Text, Title};
