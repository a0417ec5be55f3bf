//! Tera-backed view rendering.
//!
//! Every registered view becomes a named template. Templates see the
//! invocation (`command`, `text`, `args`), the resolved `user` and the
//! session `state`. A template that renders a JSON object is decoded as a
//! structured message (or the modal body for modal views); anything else is
//! delivered as plain text.

use async_trait::async_trait;
use serde_json::Value;
use tera::Tera;

use slashkit_core::handler::SlashContext;
use slashkit_core::views::{Message, RenderError, Renderer, View, ViewRegistry};

pub struct TeraRenderer {
    tera: Tera,
}

impl TeraRenderer {
    pub fn from_views(views: &ViewRegistry) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        for view in views.iter() {
            tera.add_raw_template(&view.name, &view.template).map_err(|err| {
                RenderError::Template { view: view.name.clone(), detail: err.to_string() }
            })?;
        }
        Ok(Self { tera })
    }
}

fn template_error(view: &View, err: impl ToString) -> RenderError {
    RenderError::Template { view: view.name.clone(), detail: err.to_string() }
}

fn malformed(view: &View, detail: impl Into<String>) -> RenderError {
    RenderError::MalformedPayload { view: view.name.clone(), detail: detail.into() }
}

#[async_trait]
impl Renderer for TeraRenderer {
    async fn render(&self, view: &View, ctx: &SlashContext) -> Result<Message, RenderError> {
        let mut context = tera::Context::new();
        context.insert("command", &ctx.trigger.command);
        context.insert("text", &ctx.trigger.text);
        context.insert("args", &ctx.text_args());
        context.insert("state", &ctx.state().snapshot());
        context.insert("user", &ctx.user);

        let rendered =
            self.tera.render(&view.name, &context).map_err(|err| template_error(view, err))?;
        let rendered = rendered.trim();

        if view.modal {
            let body: Value =
                serde_json::from_str(rendered).map_err(|err| malformed(view, err.to_string()))?;
            if !body.is_object() {
                return Err(malformed(view, "modal template must render a JSON object"));
            }
            return Ok(Message::modal_body(body));
        }

        if rendered.starts_with('{') {
            let value: Value =
                serde_json::from_str(rendered).map_err(|err| malformed(view, err.to_string()))?;
            return serde_json::from_value(value).map_err(|err| malformed(view, err.to_string()));
        }

        Ok(Message::from_text(rendered))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use slashkit_core::handler::SlashContext;
    use slashkit_core::trigger::Trigger;
    use slashkit_core::views::{Renderer, View, ViewRegistry};

    use super::TeraRenderer;

    fn context(command: &str, text: Option<&str>) -> SlashContext {
        let trigger = Trigger {
            command: command.to_owned(),
            user: "U1".to_owned(),
            text: text.map(str::to_owned),
            ..Trigger::default()
        };
        SlashContext::new(trigger, None, None)
    }

    fn renderer(views: &[View]) -> TeraRenderer {
        let mut registry = ViewRegistry::new();
        for view in views {
            registry.register(view.clone());
        }
        TeraRenderer::from_views(&registry).expect("templates compile")
    }

    #[tokio::test]
    async fn plain_templates_render_to_text_messages() {
        let view = View::new("todo", "{{ state.count }} open items for {{ command }}", false);
        let renderer = renderer(std::slice::from_ref(&view));
        let ctx = context("todo", None);
        ctx.state().insert("count", json!(3));

        let message = renderer.render(&view, &ctx).await.unwrap();
        assert_eq!(message.text, "3 open items for todo");
        assert_eq!(message.attachments.len(), 1);
    }

    #[tokio::test]
    async fn json_templates_decode_into_structured_messages() {
        let template = r#"{"text": "pick one", "attachments": [{"text": "{{ text }}"}]}"#;
        let view = View::new("poll", template, false);
        let renderer = renderer(std::slice::from_ref(&view));
        let ctx = context("poll", Some("tea or coffee"));

        let message = renderer.render(&view, &ctx).await.unwrap();
        assert_eq!(message.text, "pick one");
        assert_eq!(message.attachments[0].text, "tea or coffee");
    }

    #[tokio::test]
    async fn modal_templates_become_modal_bodies() {
        let template = r#"{"title": "New item", "elements": []}"#;
        let view = View::new("new_item", template, true);
        let renderer = renderer(std::slice::from_ref(&view));

        let message = renderer.render(&view, &context("todo", None)).await.unwrap();
        let modal = message.modal.expect("modal body");
        assert_eq!(modal["title"], json!("New item"));
    }

    #[tokio::test]
    async fn modal_templates_that_render_non_objects_are_rejected() {
        let view = View::new("bad", "just text", true);
        let renderer = renderer(std::slice::from_ref(&view));
        assert!(renderer.render(&view, &context("todo", None)).await.is_err());
    }

    #[tokio::test]
    async fn broken_templates_fail_at_registration() {
        let mut registry = ViewRegistry::new();
        registry.register(View::new("broken", "{{ unclosed", false));
        assert!(TeraRenderer::from_views(&registry).is_err());
    }
}
