//! View registry and the rendered message model.
//!
//! A view is a named template plus a modal flag; the registry is populated
//! before dispatch begins. Rendering itself is a collaborator behind the
//! `Renderer` trait (the server crate wires in tera).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::handler::SlashContext;

#[derive(Clone, Debug, PartialEq)]
pub struct View {
    pub name: String,
    pub template: String,
    pub modal: bool,
}

impl View {
    pub fn new(name: impl Into<String>, template: impl Into<String>, modal: bool) -> Self {
        Self { name: name.into(), template: template.into(), modal }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ViewRegistry {
    views: HashMap<String, View>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, view: View) {
        self.views.insert(view.name.clone(), view);
    }

    pub fn get(&self, name: &str) -> Option<&View> {
        self.views.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.views.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentAction {
    pub name: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl AttachmentAction {
    pub fn button(name: impl Into<String>, label: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            text: label.into(),
            kind: "button".to_owned(),
            value: Some(value.to_string()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AttachmentAction>,
}

/// A rendered response: either a list of attachments for channel delivery
/// or a modal body for dialog delivery. The transport selector stamps the
/// callback reference with the session key before sending.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modal: Option<Value>,
}

impl Message {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            attachments: vec![Attachment { text: text.clone(), ..Attachment::default() }],
            text,
            ..Self::default()
        }
    }

    pub fn modal_body(body: Value) -> Self {
        Self { modal: Some(body), ..Self::default() }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error in view `{view}`: {detail}")]
    Template { view: String, detail: String },
    #[error("rendered payload for view `{view}` is malformed: {detail}")]
    MalformedPayload { view: String, detail: String },
}

/// The rendering collaborator: turns a view definition plus the live
/// handler context into a message payload.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, view: &View, ctx: &SlashContext) -> Result<Message, RenderError>;
}

/// Interactive value for a button that should invoke `action` with `args`.
pub fn button_value(action: &str, args: &Value) -> String {
    format!("action:{action}:{args}")
}

/// Interactive value that switches the session to another view.
pub fn view_value(view: &str) -> String {
    format!("view:{view}")
}

/// Interactive value for an input bound to `action`.
pub fn input_value(action: &str) -> String {
    format!("input:{action}")
}
