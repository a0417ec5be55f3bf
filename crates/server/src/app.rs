//! Application wiring.
//!
//! `AppBuilder` collects commands, views and options; `build` connects the
//! database, loads installed workspace credentials and assembles the
//! dispatcher. The built `App` serves the webhook surface and supports
//! programmatic emits for schedulers and scripts.

use std::sync::Arc;

use anyhow::{Context, Result};
use secrecy::SecretString;

use slashkit_core::config::AppOptions;
use slashkit_core::handler::{CommandRegistry, Slash};
use slashkit_core::platform::TenantClients;
use slashkit_core::plugin::Plugin;
use slashkit_core::storage::{SchemaExt, SessionRepository};
use slashkit_core::store::SessionStore;
use slashkit_core::trigger::{ConversationAs, Trigger};
use slashkit_core::views::{View, ViewRegistry};
use slashkit_core::{DispatchError, Dispatcher, Environment, Invocation};
use slashkit_db::{
    connect, DbPool, SqlSchema, SqlSessionRepository, SqlWorkspaceRepository, WorkspaceRepository,
};
use slashkit_slack::client::{SlackClient, SlackClients};

use crate::render::TeraRenderer;
use crate::routes::{router, ServerState};

/// Builds the log filter from the configured level string. Accepts full
/// `tracing_subscriber` directives (`warn,slashkit_core=debug`), not just a
/// bare level; an unparsable value falls back to `info`.
fn log_filter(level: &str) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_logging(options: &AppOptions) {
    use slashkit_core::config::LogFormat::*;

    let fmt = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(log_filter(&options.logging.level));
    match options.logging.format {
        Compact => fmt.compact().init(),
        Pretty => fmt.pretty().init(),
        Json => fmt.json().init(),
    }
}

pub struct AppBuilder {
    options: AppOptions,
    registry: CommandRegistry,
    views: ViewRegistry,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl AppBuilder {
    pub fn new(options: AppOptions) -> Self {
        Self {
            options,
            registry: CommandRegistry::new(),
            views: ViewRegistry::new(),
            plugins: Vec::new(),
        }
    }

    pub fn command<H, F>(mut self, name: impl Into<String>, make: F) -> Self
    where
        H: Slash,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.registry.register(name, make);
        self
    }

    pub fn view(mut self, view: View) -> Self {
        self.views.register(view);
        self
    }

    /// Registers an app-level plugin. Its `extend_db` runs once during
    /// `build`; its `decorate` runs on every invocation.
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub async fn build(self) -> Result<App> {
        let options = Arc::new(self.options);

        let pool = connect(&options.database_url)
            .await
            .with_context(|| format!("opening database `{}`", options.database_url))?;
        let sessions = SqlSessionRepository::new(pool.clone());
        sessions.ensure_schema().await.context("provisioning session table")?;
        let workspaces = SqlWorkspaceRepository::new(pool.clone());
        workspaces.ensure_schema().await.context("provisioning workspace table")?;

        let app_token = options
            .slack
            .app_token
            .clone()
            .context("slack.app_token is required")?;
        let mut default_client = SlackClient::builder(app_token);
        if let Some(bot_token) = options.slack.bot_token.clone() {
            default_client = default_client.bot_token(bot_token);
        }
        let clients = Arc::new(SlackClients::new(Arc::new(default_client.build())));
        for workspace in workspaces.list().await.context("loading installed workspaces")? {
            clients.register_team(workspace.team, SecretString::from(workspace.bot_token));
        }
        tracing::info!(teams = clients.team_count(), "workspace credentials loaded");

        let schema: Arc<dyn SchemaExt> = Arc::new(SqlSchema::new(pool.clone()));
        for plugin in &self.plugins {
            plugin
                .extend_db(schema.as_ref())
                .await
                .with_context(|| format!("plugin `{}` schema extension", plugin.name()))?;
        }

        let renderer = TeraRenderer::from_views(&self.views).context("compiling view templates")?;
        let env = Environment {
            options: Arc::clone(&options),
            clients: Arc::clone(&clients) as Arc<dyn TenantClients>,
            store: Arc::new(SessionStore::new(
                Arc::new(sessions) as Arc<dyn SessionRepository>
            )),
            schema,
            views: Arc::new(self.views),
            renderer: Arc::new(renderer),
            plugins: self.plugins,
        };
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(self.registry), env));

        Ok(App { options, pool, dispatcher, clients })
    }
}

/// Controls where a programmatic emit delivers its response.
#[derive(Clone, Debug, Default)]
pub struct EmitOptions {
    pub team: Option<String>,
    pub channel: Option<String>,
    pub conversation_with: Vec<String>,
    pub conversation_as: ConversationAs,
    pub session_id: Option<String>,
}

pub struct App {
    options: Arc<AppOptions>,
    pool: DbPool,
    dispatcher: Arc<Dispatcher>,
    clients: Arc<SlackClients>,
}

impl App {
    pub fn options(&self) -> &AppOptions {
        &self.options
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn clients(&self) -> Arc<SlackClients> {
        Arc::clone(&self.clients)
    }

    /// Invokes a command as if `user` had typed it, without a webhook.
    pub async fn emit_slash(
        &self,
        command: &str,
        user: &str,
        text: Option<String>,
        emit: EmitOptions,
    ) -> Result<(), DispatchError> {
        let trigger = Trigger {
            command: command.to_owned(),
            user: user.to_owned(),
            text,
            ..trigger_base(user, emit)
        };
        self.dispatcher.dispatch(Invocation::of(trigger)).await
    }

    /// Invokes an interactive action on a command's session directly.
    pub async fn emit_action(
        &self,
        command: &str,
        user: &str,
        action: &str,
        args: serde_json::Value,
        emit: EmitOptions,
    ) -> Result<(), DispatchError> {
        let trigger = Trigger {
            command: command.to_owned(),
            user: user.to_owned(),
            action: Some(action.to_owned()),
            args: Some(args),
            ..trigger_base(user, emit)
        };
        self.dispatcher.dispatch(Invocation::of(trigger)).await
    }

    /// Binds the webhook listener and serves until interrupted.
    pub async fn serve(&self) -> Result<()> {
        let state = ServerState {
            dispatcher: Arc::clone(&self.dispatcher),
            verification_token: self.options.slack.verification_token.clone(),
        };
        let listener = tokio::net::TcpListener::bind(&self.options.bind_address)
            .await
            .with_context(|| format!("binding `{}`", self.options.bind_address))?;
        tracing::info!(bind_address = %self.options.bind_address, "webhook server started");
        axum::serve(listener, router(state))
            .with_graceful_shutdown(wait_for_shutdown())
            .await
            .context("webhook server terminated")?;
        tracing::info!("webhook server stopped");
        Ok(())
    }
}

fn trigger_base(user: &str, emit: EmitOptions) -> Trigger {
    let originator = (!emit.conversation_with.is_empty()).then(|| user.to_owned());
    Trigger {
        team: emit.team,
        channel: emit.channel,
        conversation_with: emit.conversation_with,
        conversation_as: emit.conversation_as,
        session_id: emit.session_id,
        originator,
        ..Trigger::default()
    }
}

async fn wait_for_shutdown() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "shutdown signal listener failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use slashkit_core::config::AppOptions;
    use slashkit_core::errors::HookError;
    use slashkit_core::handler::{Slash, SlashContext};
    use slashkit_core::plugin::Plugin;
    use slashkit_core::storage::{SchemaExt, StorageError};
    use slashkit_core::DispatchError;

    use super::{log_filter, AppBuilder, EmitOptions};

    struct Quiet;

    #[async_trait]
    impl Slash for Quiet {
        async fn init(&mut self, ctx: &mut SlashContext) -> Result<(), HookError> {
            ctx.suppress_view();
            Ok(())
        }

        async fn handle_text(
            &mut self,
            ctx: &mut SlashContext,
            text: &str,
        ) -> Result<(), HookError> {
            ctx.state().insert("last", serde_json::Value::String(text.to_owned()));
            Ok(())
        }
    }

    // Named shared-cache in-memory databases keep each test isolated while
    // letting every pool connection see the same schema.
    fn options(db: &str) -> AppOptions {
        let mut options = AppOptions::default();
        options.database_url = format!("sqlite:file:{db}?mode=memory&cache=shared");
        options.slack.app_token = Some("xapp-test".to_owned().into());
        options
    }

    #[tokio::test]
    async fn build_requires_an_app_token() {
        let mut options = options("app_no_token");
        options.slack.app_token = None;
        assert!(AppBuilder::new(options).build().await.is_err());
    }

    #[tokio::test]
    async fn emitting_an_unregistered_command_is_a_configuration_error() {
        let app =
            AppBuilder::new(options("app_unknown")).build().await.expect("app builds");
        let result = app.emit_slash("nope", "U1", None, EmitOptions::default()).await;
        assert!(matches!(result, Err(DispatchError::CommandNotConfigured(_))));
    }

    #[tokio::test]
    async fn emitting_a_registered_command_runs_its_hooks() {
        let app = AppBuilder::new(options("app_emit"))
            .command("quiet", || Quiet)
            .build()
            .await
            .expect("app builds");
        app.emit_slash("quiet", "U1", Some("remember this".to_owned()), EmitOptions::default())
            .await
            .expect("dispatch succeeds");

        // The suppressed view keeps the emit entirely server-side; the
        // session row still lands in the database.
        let count: i64 = sqlx_count(app.pool()).await;
        assert_eq!(count, 1);
    }

    async fn sqlx_count(pool: &slashkit_db::DbPool) -> i64 {
        sqlx::query_scalar("SELECT count(*) FROM session").fetch_one(pool).await.unwrap()
    }

    struct Votes;

    #[async_trait]
    impl Plugin for Votes {
        fn name(&self) -> &'static str {
            "votes"
        }

        async fn extend_db(&self, schema: &dyn SchemaExt) -> Result<(), StorageError> {
            schema
                .ensure_table("vote", "session_id TEXT, user_id TEXT, choice TEXT")
                .await
        }
    }

    #[tokio::test]
    async fn plugins_extend_the_schema_during_build() {
        let app = AppBuilder::new(options("app_plugin_schema"))
            .plugin(Arc::new(Votes))
            .build()
            .await
            .expect("app builds");

        let tables: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'vote'",
        )
        .fetch_one(app.pool())
        .await
        .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn log_filter_accepts_directives_and_falls_back_to_info() {
        assert_eq!(log_filter("warn").to_string(), "warn");
        assert_eq!(log_filter("foo=notalevel").to_string(), "info");
    }
}
