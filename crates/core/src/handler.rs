//! Command handlers: the `Slash` trait, per-type action tables and the
//! per-invocation context.
//!
//! A handler type implements [`Slash`]; every hook is optional. Interactive
//! actions are declared in an explicit [`Actions`] table built once per
//! handler type at registration, and looked up by name at dispatch time -
//! an unknown action is a configuration error, not a reflective miss.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::HookError;
use crate::platform::ResolvedUser;
use crate::session::{self, SessionScope};
use crate::state::{SharedState, StateMap};
use crate::storage::SchemaExt;
use crate::trigger::Trigger;

pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HookError>> + Send + 'a>>;

/// A registered action body: borrows the handler and the live context for
/// the duration of one call.
pub type ActionFn<H> = for<'a> fn(&'a mut H, &'a mut SlashContext, Value) -> ActionFuture<'a>;

/// The action table for one handler type.
pub struct Actions<H> {
    entries: HashMap<&'static str, ActionFn<H>>,
}

impl<H> Actions<H> {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn on(&mut self, name: &'static str, action: ActionFn<H>) -> &mut Self {
        self.entries.insert(name, action);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    fn get(&self, name: &str) -> Option<ActionFn<H>> {
        self.entries.get(name).copied()
    }
}

impl<H> Default for Actions<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// A user-defined slash command. One instance is constructed per
/// invocation and dropped after the response is transported.
#[async_trait]
pub trait Slash: Send + 'static {
    /// Declares the interactive actions this command exposes. Called once
    /// per type when the command is registered.
    fn actions(_table: &mut Actions<Self>)
    where
        Self: Sized,
    {
    }

    /// Hook to provision command-specific durable schema.
    async fn init_db(&mut self, _schema: &dyn SchemaExt) -> Result<(), HookError> {
        Ok(())
    }

    /// Command-specific setup: override the view, privacy or statefulness.
    async fn init(&mut self, _ctx: &mut SlashContext) -> Result<(), HookError> {
        Ok(())
    }

    /// Produces the state for a brand new session. Defaults to empty.
    async fn init_state(&mut self, _ctx: &SlashContext) -> Result<StateMap, HookError> {
        Ok(StateMap::new())
    }

    /// Called for plain invocations that carried text.
    async fn handle_text(&mut self, _ctx: &mut SlashContext, _text: &str) -> Result<(), HookError> {
        Ok(())
    }

    async fn pre_action(&mut self, _ctx: &mut SlashContext) -> Result<(), HookError> {
        Ok(())
    }

    async fn post_action(&mut self, _ctx: &mut SlashContext) -> Result<(), HookError> {
        Ok(())
    }
}

/// Per-invocation state handed to every hook. Owns the trigger copy and a
/// shared reference to the resolved session's state.
pub struct SlashContext {
    pub trigger: Trigger,
    pub user: Option<ResolvedUser>,
    /// Response visible only to the invoker (ephemeral / response URL).
    pub private: bool,
    /// Whether the session survives this invocation in durable storage.
    pub stateful: bool,
    pub response_url: Option<String>,
    pub trigger_id: Option<String>,
    pub channel: Option<String>,
    view: String,
    no_view: bool,
    state: SharedState,
}

impl SlashContext {
    pub fn new(trigger: Trigger, response_url: Option<String>, trigger_id: Option<String>) -> Self {
        let view = trigger.command.clone();
        let channel = trigger.channel.clone();
        Self {
            trigger,
            user: None,
            private: true,
            stateful: true,
            response_url,
            trigger_id,
            channel,
            view,
            no_view: false,
            state: SharedState::default(),
        }
    }

    /// The live session state. Bound during user resolution; before that
    /// it is an empty detached container.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub(crate) fn bind_state(&mut self, state: SharedState) {
        self.state = state;
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn set_view(&mut self, view: impl Into<String>) {
        self.view = view.into();
    }

    /// Skip rendering and transport entirely for this invocation.
    pub fn suppress_view(&mut self) {
        self.no_view = true;
    }

    pub fn view_suppressed(&self) -> bool {
        self.no_view
    }

    pub fn session_key(&self) -> String {
        session::session_key(&self.trigger)
    }

    pub fn scope(&self) -> SessionScope {
        SessionScope::of(&self.trigger)
    }

    pub fn is_multi_conversation(&self) -> bool {
        session::is_multi_conversation(&self.trigger)
    }

    pub fn is_originator(&self) -> bool {
        session::is_originator(&self.trigger)
    }

    pub fn text_args(&self) -> Vec<&str> {
        self.trigger.text_args()
    }

    pub fn sub_command(&self) -> Option<&str> {
        self.trigger.sub_command()
    }
}

/// Object-safe face of a handler plus its action table, built by the
/// registry so the dispatcher never sees the concrete type.
#[async_trait]
pub(crate) trait ErasedSlash: Send {
    async fn init_db(&mut self, schema: &dyn SchemaExt) -> Result<(), HookError>;
    async fn init(&mut self, ctx: &mut SlashContext) -> Result<(), HookError>;
    async fn init_state(&mut self, ctx: &SlashContext) -> Result<StateMap, HookError>;
    async fn handle_text(&mut self, ctx: &mut SlashContext, text: &str) -> Result<(), HookError>;
    async fn pre_action(&mut self, ctx: &mut SlashContext) -> Result<(), HookError>;
    async fn post_action(&mut self, ctx: &mut SlashContext) -> Result<(), HookError>;
    fn has_action(&self, name: &str) -> bool;
    async fn run_action(
        &mut self,
        ctx: &mut SlashContext,
        name: &str,
        args: Value,
    ) -> Result<(), HookError>;
}

struct TypedSlash<H: Slash> {
    handler: H,
    actions: Arc<Actions<H>>,
}

#[async_trait]
impl<H: Slash> ErasedSlash for TypedSlash<H> {
    async fn init_db(&mut self, schema: &dyn SchemaExt) -> Result<(), HookError> {
        self.handler.init_db(schema).await
    }

    async fn init(&mut self, ctx: &mut SlashContext) -> Result<(), HookError> {
        self.handler.init(ctx).await
    }

    async fn init_state(&mut self, ctx: &SlashContext) -> Result<StateMap, HookError> {
        self.handler.init_state(ctx).await
    }

    async fn handle_text(&mut self, ctx: &mut SlashContext, text: &str) -> Result<(), HookError> {
        self.handler.handle_text(ctx, text).await
    }

    async fn pre_action(&mut self, ctx: &mut SlashContext) -> Result<(), HookError> {
        self.handler.pre_action(ctx).await
    }

    async fn post_action(&mut self, ctx: &mut SlashContext) -> Result<(), HookError> {
        self.handler.post_action(ctx).await
    }

    fn has_action(&self, name: &str) -> bool {
        self.actions.contains(name)
    }

    async fn run_action(
        &mut self,
        ctx: &mut SlashContext,
        name: &str,
        args: Value,
    ) -> Result<(), HookError> {
        match self.actions.get(name) {
            Some(action) => action(&mut self.handler, ctx, args).await,
            None => Err(HookError::msg(format!("action `{name}` is not registered"))),
        }
    }
}

trait ErasedFactory: Send + Sync {
    fn build(&self) -> Box<dyn ErasedSlash>;
}

struct Factory<H: Slash, F> {
    make: F,
    actions: Arc<Actions<H>>,
}

impl<H, F> ErasedFactory for Factory<H, F>
where
    H: Slash,
    F: Fn() -> H + Send + Sync,
{
    fn build(&self) -> Box<dyn ErasedSlash> {
        Box::new(TypedSlash { handler: (self.make)(), actions: Arc::clone(&self.actions) })
    }
}

/// Maps command names to handler factories. Populated at startup; each
/// dispatch builds a fresh handler instance from its factory.
#[derive(Default)]
pub struct CommandRegistry {
    factories: HashMap<String, Box<dyn ErasedFactory>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H, F>(&mut self, name: impl Into<String>, make: F)
    where
        H: Slash,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let mut actions = Actions::new();
        H::actions(&mut actions);
        self.factories.insert(name.into(), Box::new(Factory { make, actions: Arc::new(actions) }));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub(crate) fn build(&self, name: &str) -> Option<Box<dyn ErasedSlash>> {
        self.factories.get(name).map(|factory| factory.build())
    }
}
