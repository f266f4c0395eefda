//! Display-only widgets.

use std::sync::Arc;

use liveui_core::{Session, Widget};
use parking_lot::RwLock;

use crate::base::{escape_html, WidgetBase};

/// Page title, rendered as `<h1>`.
pub struct Title {
    base: WidgetBase,
    text: RwLock<String>,
}

impl Title {
    pub fn new(text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            base: WidgetBase::new(),
            text: RwLock::new(text.into()),
        })
    }

    pub fn base(&self) -> &WidgetBase {
        &self.base
    }
}

impl Widget for Title {
    delegate_to_base!();

    fn kind(&self) -> &'static str {
        "title"
    }

    fn render(&self) -> String {
        let id = self.base.id();
        format!(
            r#"<h1 id="{id}" data-widget-id="{id}" class="lu-title">{}</h1>"#,
            escape_html(&self.text.read())
        )
    }

    fn trigger_callbacks(&self, session: &Arc<Session>, event_type: &str, value: &str) {
        self.base.trigger(session, event_type, value);
    }
}

/// Section header, rendered as `<h2>` with an optional rule below it.
pub struct Header {
    base: WidgetBase,
    text: RwLock<String>,
    divider: bool,
}

impl Header {
    pub fn new(text: impl Into<String>) -> Arc<Self> {
        Self::build(text.into(), false)
    }

    pub fn with_divider(text: impl Into<String>) -> Arc<Self> {
        Self::build(text.into(), true)
    }

    fn build(text: String, divider: bool) -> Arc<Self> {
        Arc::new(Self {
            base: WidgetBase::new(),
            text: RwLock::new(text),
            divider,
        })
    }

    pub fn base(&self) -> &WidgetBase {
        &self.base
    }
}

impl Widget for Header {
    delegate_to_base!();

    fn kind(&self) -> &'static str {
        "header"
    }

    fn render(&self) -> String {
        let id = self.base.id();
        let rule = if self.divider { "<hr>" } else { "" };
        format!(
            r#"<div id="{id}" data-widget-id="{id}" class="lu-header"><h2>{}</h2>{rule}</div>"#,
            escape_html(&self.text.read())
        )
    }

    fn trigger_callbacks(&self, session: &Arc<Session>, event_type: &str, value: &str) {
        self.base.trigger(session, event_type, value);
    }
}

/// Paragraph of text that can be rewritten after it is on screen.
pub struct Text {
    base: WidgetBase,
    text: RwLock<String>,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Arc<Self> {
        Self::with_base(WidgetBase::new(), text.into())
    }

    pub fn with_id(id: impl Into<String>, text: impl Into<String>) -> Arc<Self> {
        Self::with_base(WidgetBase::with_id(id), text.into())
    }

    fn with_base(base: WidgetBase, text: String) -> Arc<Self> {
        Arc::new(Self {
            base,
            text: RwLock::new(text),
        })
    }

    pub fn base(&self) -> &WidgetBase {
        &self.base
    }

    pub fn text(&self) -> String {
        self.text.read().clone()
    }

    /// Replace the text and push the new fragment to `session`'s connections.
    pub fn set_text(&self, session: &Session, text: impl Into<String>) {
        *self.text.write() = text.into();
        session.update_widget(self.base.id(), &self.render());
    }
}

impl Widget for Text {
    delegate_to_base!();

    fn kind(&self) -> &'static str {
        "text"
    }

    fn render(&self) -> String {
        let id = self.base.id();
        format!(
            r#"<p id="{id}" data-widget-id="{id}" class="lu-text">{}</p>"#,
            escape_html(&self.text.read())
        )
    }

    fn trigger_callbacks(&self, session: &Arc<Session>, event_type: &str, value: &str) {
        self.base.trigger(session, event_type, value);
    }
}
