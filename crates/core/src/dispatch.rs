//! The command instance lifecycle.
//!
//! One [`Dispatcher::dispatch`] call walks a single invocation through the
//! ordered protocol: construct → init_db → init → bind user & resolve
//! session → body (text or action) → persist → render → transport. A
//! failure at any step aborts the remaining steps; nothing is retried and
//! no partial state mutation is rolled back.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::config::AppOptions;
use crate::errors::DispatchError;
use crate::handler::{CommandRegistry, ErasedSlash, SlashContext};
use crate::platform::{ResolvedUser, TenantClients};
use crate::plugin::Plugin;
use crate::store::SessionStore;
use crate::storage::SchemaExt;
use crate::transport;
use crate::trigger::Trigger;
use crate::views::{Renderer, ViewRegistry};

/// One inbound invocation: the trigger plus the webhook's reply-target and
/// modal-trigger references.
#[derive(Clone, Debug, Default)]
pub struct Invocation {
    pub trigger: Trigger,
    pub response_url: Option<String>,
    pub trigger_id: Option<String>,
}

impl Invocation {
    pub fn of(trigger: Trigger) -> Self {
        Self { trigger, response_url: None, trigger_id: None }
    }
}

/// The environment collaborators every handler instance is wired to.
pub struct Environment {
    pub options: Arc<AppOptions>,
    pub clients: Arc<dyn TenantClients>,
    pub store: Arc<SessionStore>,
    pub schema: Arc<dyn SchemaExt>,
    pub views: Arc<ViewRegistry>,
    pub renderer: Arc<dyn Renderer>,
    /// App-level plugins; each decorates every invocation context before
    /// the command's own hooks run.
    pub plugins: Vec<Arc<dyn Plugin>>,
}

pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    env: Environment,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, env: Environment) -> Self {
        Self { registry, env }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.env.views
    }

    /// Runs the full lifecycle for one invocation.
    ///
    /// Configuration errors (unknown command, unknown action, unknown view
    /// switch) are raised before any state mutation.
    pub async fn dispatch(&self, invocation: Invocation) -> Result<(), DispatchError> {
        let correlation_id = Uuid::new_v4();
        let command = invocation.trigger.command.clone();
        tracing::debug!(
            %correlation_id,
            command,
            user = %invocation.trigger.user,
            action = invocation.trigger.action.as_deref(),
            "dispatching trigger"
        );

        let mut handler = self
            .registry
            .build(&command)
            .ok_or_else(|| DispatchError::CommandNotConfigured(command.clone()))?;

        if let Some(action) = invocation.trigger.action.as_deref() {
            if !handler.has_action(action) {
                return Err(DispatchError::ActionNotConfigured {
                    command,
                    action: action.to_owned(),
                });
            }
        }
        if let Some(view) = invocation.trigger.view.as_deref() {
            if !self.env.views.contains(view) {
                return Err(DispatchError::ViewNotRegistered(view.to_owned()));
            }
        }

        let mut ctx =
            SlashContext::new(invocation.trigger, invocation.response_url, invocation.trigger_id);

        for plugin in &self.env.plugins {
            plugin
                .decorate(&mut ctx)
                .await
                .map_err(|err| DispatchError::hook("decorate", err))?;
        }

        handler
            .init_db(self.env.schema.as_ref())
            .await
            .map_err(|err| DispatchError::hook("init_db", err))?;
        handler.init(&mut ctx).await.map_err(|err| DispatchError::hook("init", err))?;
        if let Some(view) = ctx.trigger.view.clone() {
            ctx.set_view(view);
        }

        self.bind_user(handler.as_mut(), &mut ctx).await?;
        self.run_body(handler.as_mut(), &mut ctx).await?;

        let scope = ctx.scope();
        self.env.store.persist(&scope, ctx.stateful, ctx.state()).await?;

        if ctx.view_suppressed() {
            tracing::debug!(%correlation_id, command = %ctx.trigger.command, "view suppressed");
            return Ok(());
        }
        self.render_and_deliver(&mut ctx).await
    }

    /// Like [`Dispatcher::dispatch`], but upstream failures are logged and
    /// swallowed at this boundary, per platform convention: the webhook
    /// only ever surfaces configuration errors.
    pub async fn dispatch_logged(&self, invocation: Invocation) -> Result<(), DispatchError> {
        match self.dispatch(invocation).await {
            Err(err) if !err.is_configuration() => {
                tracing::error!(error = %err, "dispatch failed");
                Ok(())
            }
            other => other,
        }
    }

    /// Resolves the invoking user (optionally fetching their platform
    /// profile) and binds the session state to the context.
    async fn bind_user(
        &self,
        handler: &mut dyn ErasedSlash,
        ctx: &mut SlashContext,
    ) -> Result<(), DispatchError> {
        let profile = if self.env.options.fetch_slack_profile {
            let client = self.env.clients.client_for(ctx.trigger.team.as_deref());
            Some(client.get_profile(&ctx.trigger.user).await?)
        } else {
            None
        };
        ctx.user = Some(ResolvedUser { slack_id: ctx.trigger.user.clone(), profile });

        let scope = ctx.scope();
        let state = match self.env.store.resolve(&scope, ctx.stateful).await? {
            Some(state) => state,
            None => {
                let initial = handler
                    .init_state(ctx)
                    .await
                    .map_err(|err| DispatchError::hook("init_state", err))?;
                self.env.store.create(&scope, initial)
            }
        };
        ctx.bind_state(state);
        Ok(())
    }

    async fn run_body(
        &self,
        handler: &mut dyn ErasedSlash,
        ctx: &mut SlashContext,
    ) -> Result<(), DispatchError> {
        match ctx.trigger.action.clone() {
            Some(action) => {
                let args = ctx.trigger.args.clone().unwrap_or(Value::Null);
                handler
                    .pre_action(ctx)
                    .await
                    .map_err(|err| DispatchError::hook("pre_action", err))?;
                handler
                    .run_action(ctx, &action, args)
                    .await
                    .map_err(|err| DispatchError::hook("action", err))?;
                handler
                    .post_action(ctx)
                    .await
                    .map_err(|err| DispatchError::hook("post_action", err))?;
            }
            None => {
                if let Some(text) = ctx.trigger.text.clone() {
                    if !text.is_empty() {
                        handler
                            .handle_text(ctx, &text)
                            .await
                            .map_err(|err| DispatchError::hook("handle_text", err))?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn render_and_deliver(&self, ctx: &mut SlashContext) -> Result<(), DispatchError> {
        let view = self
            .env
            .views
            .get(ctx.view())
            .ok_or_else(|| DispatchError::ViewNotRegistered(ctx.view().to_owned()))?
            .clone();
        let message = self.env.renderer.render(&view, ctx).await.map_err(|err| {
            DispatchError::Render { view: view.name.clone(), detail: err.to_string() }
        })?;
        let client = self.env.clients.client_for(ctx.trigger.team.as_deref());
        transport::deliver(client.as_ref(), &view, ctx, message).await?;
        Ok(())
    }
}
